//! WebDriver client implementation
//!
//! JSON-over-HTTP client for a W3C WebDriver endpoint (chromedriver, geckodriver,
//! Selenium grid). Every command is one request/response round trip.

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::traits::WebDriverClient;
use super::types::*;
use crate::Error;

/// Per-request timeout; navigation may legitimately take a while
const COMMAND_TIMEOUT: Duration = Duration::from_secs(120);

/// WebDriver client implementation
#[derive(Debug, Clone)]
pub struct WebDriverClientImpl {
    /// HTTP client
    http: reqwest::Client,
    /// WebDriver endpoint (e.g. "http://127.0.0.1:9515")
    endpoint: String,
    /// Remote session id
    session_id: String,
}

impl WebDriverClientImpl {
    /// Create a new remote session
    ///
    /// # Arguments
    /// * `endpoint` - WebDriver endpoint (e.g. "http://127.0.0.1:9515")
    /// * `capabilities` - `alwaysMatch` capabilities for the new session
    pub async fn connect<S: Into<String>>(endpoint: S, capabilities: Value) -> Result<Self, Error> {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        info!("Creating WebDriver session at {}", endpoint);

        let http = reqwest::Client::builder()
            .timeout(COMMAND_TIMEOUT)
            .build()
            .map_err(|e| Error::internal(format!("Failed to create HTTP client: {}", e)))?;

        let body = json!({ "capabilities": { "alwaysMatch": capabilities } });
        let value = Self::send(&http, Method::POST, &format!("{}/session", endpoint), Some(body)).await?;

        let response: NewSessionResponse = serde_json::from_value(value)
            .map_err(|e| Error::driver_initialization(format!("Malformed new session response: {}", e)))?;

        info!("WebDriver session {} created", response.session_id);

        Ok(Self {
            http,
            endpoint,
            session_id: response.session_id,
        })
    }

    /// WebDriver endpoint this session lives on
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send one command and unwrap the `value` member of the reply
    async fn send(
        http: &reqwest::Client,
        method: Method,
        url: &str,
        body: Option<Value>,
    ) -> Result<Value, Error> {
        debug!("WebDriver {} {}", method, url);

        let mut request = http.request(method, url);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();
        let payload: Value = response.json().await.unwrap_or(Value::Null);
        let value = payload.get("value").cloned().unwrap_or(Value::Null);

        if status.is_success() {
            return Ok(value);
        }

        match serde_json::from_value::<WebDriverErrorBody>(value) {
            Ok(body) => Err(body.into_error()),
            Err(_) => Err(Error::webdriver(
                status.as_str(),
                format!("Unexpected WebDriver response for {}", url),
            )),
        }
    }

    /// Send a command scoped to this session
    async fn command(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value, Error> {
        let url = format!("{}/session/{}{}", self.endpoint, self.session_id, path);
        Self::send(&self.http, method, &url, body).await
    }

    /// Find path for a root element, or the document
    fn find_path(root: Option<&WebElement>, multiple: bool) -> String {
        let suffix = if multiple { "elements" } else { "element" };
        match root {
            Some(el) => format!("/element/{}/{}", el.id(), suffix),
            None => format!("/{}", suffix),
        }
    }
}

#[async_trait]
impl WebDriverClient for WebDriverClientImpl {
    fn session_id(&self) -> &str {
        &self.session_id
    }

    async fn navigate(&self, url: &str) -> Result<(), Error> {
        info!("Navigating to {}", url);
        self.command(Method::POST, "/url", Some(json!({ "url": url }))).await?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String, Error> {
        let value = self.command(Method::GET, "/url", None).await?;
        value
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| Error::webdriver("invalid response", "current URL is not a string"))
    }

    async fn refresh(&self) -> Result<(), Error> {
        info!("Refreshing page");
        self.command(Method::POST, "/refresh", Some(json!({}))).await?;
        Ok(())
    }

    async fn find_element(
        &self,
        using: LocatorStrategy,
        value: &str,
        root: Option<&WebElement>,
    ) -> Result<WebElement, Error> {
        let params = serde_json::to_value(FindElementParams { using, value })?;
        let result = self
            .command(Method::POST, &Self::find_path(root, false), Some(params))
            .await?;

        WebElement::from_json(&result)
            .ok_or_else(|| Error::webdriver("invalid response", "find element returned no reference"))
    }

    async fn find_elements(
        &self,
        using: LocatorStrategy,
        value: &str,
        root: Option<&WebElement>,
    ) -> Result<Vec<WebElement>, Error> {
        let params = serde_json::to_value(FindElementParams { using, value })?;
        let result = self
            .command(Method::POST, &Self::find_path(root, true), Some(params))
            .await?;

        Ok(result
            .as_array()
            .map(|items| items.iter().filter_map(WebElement::from_json).collect())
            .unwrap_or_default())
    }

    async fn element_attribute(&self, element: &WebElement, name: &str) -> Result<Option<String>, Error> {
        let value = self
            .command(Method::GET, &format!("/element/{}/attribute/{}", element.id(), name), None)
            .await?;
        Ok(value.as_str().map(|s| s.to_string()))
    }

    async fn element_property(&self, element: &WebElement, name: &str) -> Result<Value, Error> {
        self.command(Method::GET, &format!("/element/{}/property/{}", element.id(), name), None)
            .await
    }

    async fn element_text(&self, element: &WebElement) -> Result<String, Error> {
        let value = self
            .command(Method::GET, &format!("/element/{}/text", element.id()), None)
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn element_tag_name(&self, element: &WebElement) -> Result<String, Error> {
        let value = self
            .command(Method::GET, &format!("/element/{}/name", element.id()), None)
            .await?;
        Ok(value.as_str().unwrap_or_default().to_lowercase())
    }

    async fn element_rect(&self, element: &WebElement) -> Result<Rect, Error> {
        let value = self
            .command(Method::GET, &format!("/element/{}/rect", element.id()), None)
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn element_displayed(&self, element: &WebElement) -> Result<bool, Error> {
        let value = self
            .command(Method::GET, &format!("/element/{}/displayed", element.id()), None)
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn element_click(&self, element: &WebElement) -> Result<(), Error> {
        debug!("Clicking element {}", element.id());
        self.command(Method::POST, &format!("/element/{}/click", element.id()), Some(json!({})))
            .await?;
        Ok(())
    }

    async fn element_send_keys(&self, element: &WebElement, text: &str) -> Result<(), Error> {
        self.command(
            Method::POST,
            &format!("/element/{}/value", element.id()),
            Some(json!({ "text": text })),
        )
        .await?;
        Ok(())
    }

    async fn execute_script(&self, script: &str, args: Vec<Value>) -> Result<Value, Error> {
        debug!("Executing script ({} bytes, {} args)", script.len(), args.len());
        let params = serde_json::to_value(ExecuteScriptParams { script, args })?;
        self.command(Method::POST, "/execute/sync", Some(params)).await
    }

    async fn get_cookies(&self) -> Result<Vec<Cookie>, Error> {
        let value = self.command(Method::GET, "/cookie", None).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn add_cookie(&self, cookie: &Cookie) -> Result<(), Error> {
        self.command(Method::POST, "/cookie", Some(json!({ "cookie": cookie.to_wire() })))
            .await?;
        Ok(())
    }

    async fn close(&self) -> Result<(), Error> {
        info!("Deleting WebDriver session {}", self.session_id);
        match self.command(Method::DELETE, "", None).await {
            Ok(_) => Ok(()),
            Err(Error::SessionClosed(msg)) => {
                warn!("Session {} already gone: {}", self.session_id, msg);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

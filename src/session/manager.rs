//! Session manager implementation
//!
//! Owns the one remote browser session and is the only component that talks
//! to the WebDriver transport. Other components get element handles and
//! results back, never the client itself.

use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use super::cookies::{read_cookie_file, write_cookie_file};
use super::driver::{chrome_capabilities, DriverProcess, DriverResolver};
use super::handle::ElementHandle;
use super::query::rewrite_query;
use crate::config::BrowserConfig;
use crate::locator::{ElementIntrospection, LocatorDescriptor};
use crate::retry::RetryPolicy;
use crate::webdriver::{Rect, WebDriverClient, WebDriverClientImpl, WebElement};
use crate::{Error, Result};

/// Outcome of applying a cookie file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieLoadReport {
    /// Cookies the browser accepted
    pub applied: usize,
    /// Names of cookies the browser rejected
    pub rejected: Vec<String>,
}

#[derive(Debug, Default)]
struct SessionState {
    base_url: Option<String>,
    current_url: Option<String>,
    epoch: u64,
}

/// Owner of the single remote browser session
#[derive(Debug)]
pub struct SessionManager {
    client: Arc<dyn WebDriverClient>,
    state: RwLock<SessionState>,
    driver: tokio::sync::Mutex<Option<DriverProcess>>,
    closed: AtomicBool,
    navigation_settle: Duration,
}

impl SessionManager {
    /// Launch (or attach to) a browser and create the session
    ///
    /// With `webdriver_url` set the session attaches to that endpoint;
    /// otherwise a driver is resolved, spawned and connected to.
    #[instrument(skip(config))]
    pub async fn open(config: &BrowserConfig, navigation_settle: Duration) -> Result<Self> {
        let capabilities = chrome_capabilities(config);

        if let Some(url) = &config.webdriver_url {
            info!("Attaching to WebDriver endpoint {}", url);
            let client = WebDriverClientImpl::connect(url.clone(), capabilities)
                .await
                .map_err(|e| Error::driver_initialization(format!("Cannot create session at {}: {}", url, e)))?;
            return Ok(Self::with_client(Arc::new(client), navigation_settle));
        }

        let resolved = DriverResolver::from_config(config).resolve().await?;
        let readiness = RetryPolicy::fixed(
            (config.driver_startup_timeout_ms / 250).max(1) as u32,
            Duration::from_millis(250),
        );
        let mut process = DriverProcess::spawn(&resolved.path, config.driver_port, &readiness).await?;

        match WebDriverClientImpl::connect(process.endpoint(), capabilities).await {
            Ok(client) => {
                let manager = Self::with_client(Arc::new(client), navigation_settle);
                *manager.driver.lock().await = Some(process);
                Ok(manager)
            }
            Err(e) => {
                process.kill().await;
                Err(Error::driver_initialization(format!("Cannot create browser session: {}", e)))
            }
        }
    }

    /// Wrap an existing session client
    pub fn with_client(client: Arc<dyn WebDriverClient>, navigation_settle: Duration) -> Self {
        Self {
            client,
            state: RwLock::new(SessionState::default()),
            driver: tokio::sync::Mutex::new(None),
            closed: AtomicBool::new(false),
            navigation_settle,
        }
    }

    /// Remote session id
    pub fn session_id(&self) -> &str {
        self.client.session_id()
    }

    /// Current page epoch
    pub fn epoch(&self) -> u64 {
        self.state.read().map(|s| s.epoch).unwrap_or_default()
    }

    /// First URL navigated to in this session
    pub fn base_url(&self) -> Option<String> {
        self.state.read().ok().and_then(|s| s.base_url.clone())
    }

    /// Last URL this manager navigated to
    pub fn current_url(&self) -> Option<String> {
        self.state.read().ok().and_then(|s| s.current_url.clone())
    }

    /// Whether `close` has been called
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Invalidate every outstanding handle
    pub fn invalidate(&self) -> Result<u64> {
        let mut state = self
            .state
            .write()
            .map_err(|e| Error::internal(format!("Lock error: {}", e)))?;
        state.epoch += 1;
        debug!("Page epoch advanced to {}", state.epoch);
        Ok(state.epoch)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(Error::session_closed(format!("Session {} is closed", self.session_id())));
        }
        Ok(())
    }

    /// Resolve a handle, refusing ones from an older epoch
    fn live<'a>(&self, handle: &'a ElementHandle) -> Result<&'a WebElement> {
        self.ensure_open()?;
        let epoch = self.epoch();
        if handle.epoch() != epoch {
            return Err(Error::stale(format!(
                "Handle {} belongs to epoch {}, page is at epoch {}",
                handle.id(),
                handle.epoch(),
                epoch
            )));
        }
        Ok(handle.element())
    }

    /// Pass a result through, advancing the epoch when the browser reports staleness
    fn observe<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(Error::StaleElement(_)) = &result {
            self.invalidate()?;
        }
        result
    }

    fn set_location(&self, url: &str) -> Result<()> {
        let mut state = self
            .state
            .write()
            .map_err(|e| Error::internal(format!("Lock error: {}", e)))?;
        if state.base_url.is_none() {
            state.base_url = Some(url.to_string());
        }
        state.current_url = Some(url.to_string());
        state.epoch += 1;
        Ok(())
    }

    async fn settle(&self) {
        if !self.navigation_settle.is_zero() {
            tokio::time::sleep(self.navigation_settle).await;
        }
    }

    /// Load `url`, then wait the navigation settle interval
    #[instrument(skip(self))]
    pub async fn navigate(&self, url: &str) -> Result<()> {
        self.ensure_open()?;
        self.client.navigate(url).await?;
        self.set_location(url)?;
        self.settle().await;
        Ok(())
    }

    /// Reload the current page, then wait the navigation settle interval
    #[instrument(skip(self))]
    pub async fn reload(&self) -> Result<()> {
        self.ensure_open()?;
        self.client.refresh().await?;
        self.invalidate()?;
        self.settle().await;
        Ok(())
    }

    /// Replace or insert query parameters on the current URL and load the result
    #[instrument(skip(self))]
    pub async fn rewrite_query_and_navigate(&self, updates: &[(&str, String)]) -> Result<String> {
        self.ensure_open()?;
        let current = match self.client.current_url().await {
            Ok(url) => url,
            Err(e) => {
                debug!("Browser URL unavailable ({}), using last navigated URL", e);
                self.current_url()
                    .ok_or_else(|| Error::internal("No current URL to rewrite"))?
            }
        };

        let target = rewrite_query(&current, updates)?;
        self.navigate(&target).await?;
        Ok(target)
    }

    /// Write the browser's cookie jar to `path`
    #[instrument(skip(self))]
    pub async fn save_cookies(&self, path: &Path) -> Result<usize> {
        self.ensure_open()?;
        let cookies = self.client.get_cookies().await?;
        write_cookie_file(path, &cookies)?;
        info!("Saved {} cookies to {}", cookies.len(), path.display());
        Ok(cookies.len())
    }

    /// Apply a saved cookie jar
    ///
    /// With `navigate_first`, that URL is loaded before the cookies are added
    /// and the page is reloaded afterwards. Rejected cookies are skipped.
    #[instrument(skip(self))]
    pub async fn load_cookies(&self, path: &Path, navigate_first: Option<&str>) -> Result<CookieLoadReport> {
        self.ensure_open()?;
        let cookies = read_cookie_file(path)?;

        if let Some(url) = navigate_first {
            self.navigate(url).await?;
        }

        let mut report = CookieLoadReport::default();
        for cookie in &cookies {
            match self.client.add_cookie(cookie).await {
                Ok(()) => report.applied += 1,
                Err(e @ (Error::SessionClosed(_) | Error::Http(_))) => return Err(e),
                Err(e) => {
                    warn!("Skipping cookie {}: {}", cookie.name, e);
                    report.rejected.push(cookie.name.clone());
                }
            }
        }

        info!(
            "Applied {} of {} cookies from {}",
            report.applied,
            cookies.len(),
            path.display()
        );

        if navigate_first.is_some() {
            self.reload().await?;
        }

        Ok(report)
    }

    /// Run a script against the page, or with `context` as `arguments[0]`
    pub async fn execute_script(&self, script: &str, context: Option<&ElementHandle>) -> Result<Value> {
        let args = match context {
            Some(handle) => vec![self.live(handle)?.to_json()],
            None => {
                self.ensure_open()?;
                Vec::new()
            }
        };
        let result = self.client.execute_script(script, args).await;
        self.observe(result)
    }

    /// First element matching `locator`, `None` when nothing matches
    pub async fn find_element(
        &self,
        locator: &LocatorDescriptor,
        root: Option<&ElementHandle>,
    ) -> Result<Option<ElementHandle>> {
        let root = match root {
            Some(handle) => Some(self.live(handle)?),
            None => {
                self.ensure_open()?;
                None
            }
        };
        let epoch = self.epoch();

        let result = self.client.find_element(locator.strategy, &locator.value, root).await;
        match self.observe(result) {
            Ok(element) => Ok(Some(ElementHandle::new(element, epoch))),
            Err(Error::ElementNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Every element matching `locator`
    pub async fn find_elements(
        &self,
        locator: &LocatorDescriptor,
        root: Option<&ElementHandle>,
    ) -> Result<Vec<ElementHandle>> {
        let root = match root {
            Some(handle) => Some(self.live(handle)?),
            None => {
                self.ensure_open()?;
                None
            }
        };
        let epoch = self.epoch();

        let result = self.client.find_elements(locator.strategy, &locator.value, root).await;
        match self.observe(result) {
            Ok(elements) => Ok(elements.into_iter().map(|e| ElementHandle::new(e, epoch)).collect()),
            Err(Error::ElementNotFound(_)) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    /// DOM property (e.g. `innerHTML`)
    pub async fn property(&self, handle: &ElementHandle, name: &str) -> Result<Value> {
        let element = self.live(handle)?;
        let result = self.client.element_property(element, name).await;
        self.observe(result)
    }

    /// Serialized inner markup
    pub async fn inner_html(&self, handle: &ElementHandle) -> Result<String> {
        Ok(match self.property(handle, "innerHTML").await? {
            Value::String(html) => html,
            Value::Null => String::new(),
            other => other.to_string(),
        })
    }

    /// Whether the element is displayed
    pub async fn is_displayed(&self, handle: &ElementHandle) -> Result<bool> {
        let element = self.live(handle)?;
        let result = self.client.element_displayed(element).await;
        self.observe(result)
    }

    /// Click the element
    pub async fn click(&self, handle: &ElementHandle) -> Result<()> {
        let element = self.live(handle)?;
        let result = self.client.element_click(element).await;
        self.observe(result)
    }

    /// Type into the element
    pub async fn send_keys(&self, handle: &ElementHandle, text: &str) -> Result<()> {
        let element = self.live(handle)?;
        let result = self.client.element_send_keys(element, text).await;
        self.observe(result)
    }

    /// Release the browser session and driver process; safe to call repeatedly
    #[instrument(skip(self))]
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            debug!("Session {} already closed", self.session_id());
            return Ok(());
        }

        info!("Closing session {}", self.session_id());
        let result = self.client.close().await;
        if let Err(e) = &result {
            warn!("Failed to delete session {}: {}", self.session_id(), e);
        }

        if let Some(mut process) = self.driver.lock().await.take() {
            process.kill().await;
        }

        result
    }
}

#[async_trait]
impl ElementIntrospection for SessionManager {
    async fn attribute(&self, handle: &ElementHandle, name: &str) -> Result<Option<String>> {
        let element = self.live(handle)?;
        let result = self.client.element_attribute(element, name).await;
        self.observe(result)
    }

    async fn tag_name(&self, handle: &ElementHandle) -> Result<String> {
        let element = self.live(handle)?;
        let result = self.client.element_tag_name(element).await;
        self.observe(result)
    }

    async fn text(&self, handle: &ElementHandle) -> Result<String> {
        let element = self.live(handle)?;
        let result = self.client.element_text(element).await;
        self.observe(result)
    }

    async fn rect(&self, handle: &ElementHandle) -> Result<Rect> {
        let element = self.live(handle)?;
        let result = self.client.element_rect(element).await;
        self.observe(result)
    }

    async fn execute_script(&self, script: &str, element: Option<&ElementHandle>) -> Result<Value> {
        SessionManager::execute_script(self, script, element).await
    }
}

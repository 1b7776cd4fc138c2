//! WebDriver layer traits
//!
//! This module defines the abstract interface to a remote browser session.

use async_trait::async_trait;
use serde_json::Value;

use super::types::{Cookie, LocatorStrategy, Rect, WebElement};

/// Session-scoped WebDriver client
///
/// One instance speaks for exactly one remote session. Every method is a
/// single request/response exchange; callers must not interleave mutating
/// commands from several tasks.
#[async_trait]
pub trait WebDriverClient: Send + Sync + std::fmt::Debug {
    /// Remote session id
    fn session_id(&self) -> &str;

    /// Load a URL in the current top-level browsing context
    async fn navigate(&self, url: &str) -> Result<(), crate::Error>;

    /// URL of the current top-level browsing context
    async fn current_url(&self) -> Result<String, crate::Error>;

    /// Reload the current page
    async fn refresh(&self) -> Result<(), crate::Error>;

    /// Find the first element matching the locator, optionally below `root`
    async fn find_element(
        &self,
        using: LocatorStrategy,
        value: &str,
        root: Option<&WebElement>,
    ) -> Result<WebElement, crate::Error>;

    /// Find every element matching the locator, optionally below `root`
    async fn find_elements(
        &self,
        using: LocatorStrategy,
        value: &str,
        root: Option<&WebElement>,
    ) -> Result<Vec<WebElement>, crate::Error>;

    /// Content attribute of an element
    async fn element_attribute(&self, element: &WebElement, name: &str) -> Result<Option<String>, crate::Error>;

    /// DOM property of an element (e.g. `innerHTML`)
    async fn element_property(&self, element: &WebElement, name: &str) -> Result<Value, crate::Error>;

    /// Rendered text of an element
    async fn element_text(&self, element: &WebElement) -> Result<String, crate::Error>;

    /// Lowercase tag name of an element
    async fn element_tag_name(&self, element: &WebElement) -> Result<String, crate::Error>;

    /// Position and size of an element
    async fn element_rect(&self, element: &WebElement) -> Result<Rect, crate::Error>;

    /// Whether the element is displayed
    async fn element_displayed(&self, element: &WebElement) -> Result<bool, crate::Error>;

    /// Click an element
    async fn element_click(&self, element: &WebElement) -> Result<(), crate::Error>;

    /// Send keystrokes to an element
    async fn element_send_keys(&self, element: &WebElement, text: &str) -> Result<(), crate::Error>;

    /// Execute a synchronous script; element arguments use the W3C reference form
    async fn execute_script(&self, script: &str, args: Vec<Value>) -> Result<Value, crate::Error>;

    /// All cookies visible to the current document
    async fn get_cookies(&self) -> Result<Vec<Cookie>, crate::Error>;

    /// Add a cookie to the current document's cookie store
    async fn add_cookie(&self, cookie: &Cookie) -> Result<(), crate::Error>;

    /// Delete the remote session
    async fn close(&self) -> Result<(), crate::Error>;
}

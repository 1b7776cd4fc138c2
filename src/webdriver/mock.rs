//! Mock WebDriver implementation for testing
//!
//! An in-memory fake document driven through the same [`WebDriverClient`]
//! trait as the real wire client. Documents are produced by a router from the
//! URL being loaded and the cookies in the jar, so login flows, lazy rendering
//! and handle staleness can be exercised without a browser.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use super::traits::WebDriverClient;
use super::types::*;
use crate::Error;

/// What the router sees when a document is (re)loaded
#[derive(Debug, Clone, Copy)]
pub struct MockRequest<'a> {
    /// URL being loaded
    pub url: &'a str,
    /// Cookie jar at load time
    pub cookies: &'a [Cookie],
}

impl MockRequest<'_> {
    /// Whether the jar holds a cookie with the given name
    pub fn has_cookie(&self, name: &str) -> bool {
        self.cookies.iter().any(|c| c.name == name)
    }
}

/// Produces the document for a request
pub type MockRouter = Arc<dyn Fn(&MockRequest<'_>) -> MockDocument + Send + Sync>;

/// Side effect of clicking a node
#[derive(Debug, Clone, PartialEq)]
pub enum ClickEffect {
    /// Replace the inner HTML of another node
    SetHtml { target: usize, html: String },
    /// Append to the inner HTML of another node
    AppendHtml { target: usize, html: String },
    /// Put a cookie into the jar
    SetCookie(Cookie),
    /// Load a URL
    Navigate(String),
    /// Re-render the document, invalidating every handle
    Rerender,
}

/// One node of the fake document
#[derive(Debug, Clone, PartialEq)]
pub struct MockNode {
    pub tag: String,
    pub attributes: BTreeMap<String, String>,
    pub text: String,
    pub inner_html: String,
    pub parent: Option<usize>,
    /// Extra locators this node answers to (complex CSS/XPath the matcher does not parse)
    pub aliases: Vec<(LocatorStrategy, String)>,
    /// Node only exists once this many scroll commands ran on the current document
    pub reveal_after_scrolls: u32,
    pub displayed: bool,
    pub click_fails: bool,
    pub on_click: Vec<ClickEffect>,
}

impl MockNode {
    /// Create a displayed node with the given tag
    pub fn new<S: Into<String>>(tag: S) -> Self {
        Self {
            tag: tag.into().to_lowercase(),
            attributes: BTreeMap::new(),
            text: String::new(),
            inner_html: String::new(),
            parent: None,
            aliases: Vec::new(),
            reveal_after_scrolls: 0,
            displayed: true,
            click_fails: false,
            on_click: Vec::new(),
        }
    }

    pub fn id<S: Into<String>>(self, id: S) -> Self {
        self.attr("id", id)
    }

    pub fn class<S: Into<String>>(self, class: S) -> Self {
        self.attr("class", class)
    }

    pub fn attr<K: Into<String>, V: Into<String>>(mut self, name: K, value: V) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn text<S: Into<String>>(mut self, text: S) -> Self {
        self.text = text.into();
        self
    }

    pub fn html<S: Into<String>>(mut self, html: S) -> Self {
        self.inner_html = html.into();
        self
    }

    pub fn parent(mut self, parent: usize) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn alias<S: Into<String>>(mut self, strategy: LocatorStrategy, value: S) -> Self {
        self.aliases.push((strategy, value.into()));
        self
    }

    pub fn revealed_after(mut self, scrolls: u32) -> Self {
        self.reveal_after_scrolls = scrolls;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.displayed = false;
        self
    }

    pub fn failing_click(mut self) -> Self {
        self.click_fails = true;
        self
    }

    pub fn on_click(mut self, effect: ClickEffect) -> Self {
        self.on_click.push(effect);
        self
    }

    fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(|s| s.as_str())
    }

    fn has_class(&self, class: &str) -> bool {
        self.attribute("class")
            .map(|c| c.split_whitespace().any(|token| token == class))
            .unwrap_or(false)
    }

    fn matches(&self, using: LocatorStrategy, value: &str) -> bool {
        if self.aliases.iter().any(|(s, v)| *s == using && v == value) {
            return true;
        }

        match using {
            LocatorStrategy::Id => self.attribute("id") == Some(value),
            LocatorStrategy::ClassName => self.has_class(value),
            LocatorStrategy::TagName => self.tag.eq_ignore_ascii_case(value),
            LocatorStrategy::Name => self.attribute("name") == Some(value),
            LocatorStrategy::LinkText => self.tag == "a" && self.text.trim() == value,
            LocatorStrategy::CssSelector => self.matches_css(value.trim()),
            LocatorStrategy::XPath => self.matches_xpath(value.trim()),
        }
    }

    /// `#id`, `tag[attr="v"]`, `tag.class`, `.class` or a bare tag
    fn matches_css(&self, selector: &str) -> bool {
        if let Some(id) = selector.strip_prefix('#') {
            return self.attribute("id") == Some(id);
        }

        if let Some((tag, rest)) = selector.split_once('[') {
            let Some((name, value)) = rest.trim_end_matches(']').split_once('=') else {
                return false;
            };
            let value = value.trim_matches(|c| c == '"' || c == '\'');
            return (tag.is_empty() || self.tag == tag) && self.attribute(name) == Some(value);
        }

        if let Some((tag, class)) = selector.split_once('.') {
            return (tag.is_empty() || self.tag == tag) && self.has_class(class);
        }

        !selector.is_empty()
            && selector.chars().all(|c| c.is_ascii_alphanumeric())
            && self.tag == selector.to_lowercase()
    }

    /// `//*[@id='x']` or `//tag`
    fn matches_xpath(&self, path: &str) -> bool {
        if let Some(rest) = path.strip_prefix("//*[@id=") {
            let id = rest.trim_end_matches(']').trim_matches(|c| c == '"' || c == '\'');
            return self.attribute("id") == Some(id);
        }

        match path.strip_prefix("//") {
            Some(tag) if !tag.is_empty() && tag.chars().all(|c| c.is_ascii_alphanumeric()) => {
                self.tag == tag.to_lowercase()
            }
            _ => false,
        }
    }
}

/// A fake document: nodes in document order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MockDocument {
    pub nodes: Vec<MockNode>,
}

impl MockDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a node and return its index
    pub fn push(&mut self, node: MockNode) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    /// Builder form of [`MockDocument::push`]
    pub fn with(mut self, node: MockNode) -> Self {
        self.push(node);
        self
    }

    /// Index of the first node carrying the given id attribute
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.attribute("id") == Some(id))
    }
}

struct MockState {
    router: MockRouter,
    url: String,
    document: MockDocument,
    generation: u64,
    cookies: Vec<Cookie>,
    rejected: HashSet<String>,
    scroll_count: u32,
    closed: bool,
    log: Vec<String>,
}

impl MockState {
    fn load(&mut self, url: &str) {
        self.url = url.to_string();
        self.generation += 1;
        self.scroll_count = 0;
        let request = MockRequest {
            url,
            cookies: &self.cookies,
        };
        self.document = (self.router)(&request);
    }

    fn visited(&self) -> bool {
        self.url.starts_with("http")
    }

    fn is_present(&self, index: usize) -> bool {
        let mut current = Some(index);
        while let Some(i) = current {
            let Some(node) = self.document.nodes.get(i) else {
                return false;
            };
            if self.scroll_count < node.reveal_after_scrolls {
                return false;
            }
            current = node.parent;
        }
        true
    }

    fn is_descendant(&self, index: usize, ancestor: usize) -> bool {
        let mut current = self.document.nodes.get(index).and_then(|n| n.parent);
        while let Some(i) = current {
            if i == ancestor {
                return true;
            }
            current = self.document.nodes.get(i).and_then(|n| n.parent);
        }
        false
    }

    fn element(&self, index: usize) -> WebElement {
        WebElement(format!("node-{}-{}", self.generation, index))
    }

    fn resolve(&self, element: &WebElement) -> Result<usize, Error> {
        let parsed = element
            .id()
            .strip_prefix("node-")
            .and_then(|rest| rest.split_once('-'))
            .and_then(|(g, i)| Some((g.parse::<u64>().ok()?, i.parse::<usize>().ok()?)));

        let Some((generation, index)) = parsed else {
            return Err(Error::webdriver("no such element", format!("Unknown element {}", element.id())));
        };

        if generation != self.generation || !self.is_present(index) {
            return Err(Error::stale(format!("Element {} is not attached to the page document", element.id())));
        }

        Ok(index)
    }

    fn matching(&self, using: LocatorStrategy, value: &str, root: Option<usize>) -> Vec<usize> {
        (0..self.document.nodes.len())
            .filter(|&i| self.is_present(i))
            .filter(|&i| root.map(|r| self.is_descendant(i, r)).unwrap_or(true))
            .filter(|&i| self.document.nodes[i].matches(using, value))
            .collect()
    }

    fn positional_xpath(&self, index: usize) -> String {
        let mut segments = Vec::new();
        let mut current = Some(index);
        while let Some(i) = current {
            let node = &self.document.nodes[i];
            let position = (0..i)
                .filter(|&j| self.document.nodes[j].parent == node.parent && self.document.nodes[j].tag == node.tag)
                .count()
                + 1;
            segments.push(format!("{}[{}]", node.tag, position));
            current = node.parent;
        }
        segments.reverse();
        format!("/html/body/{}", segments.join("/"))
    }

    fn add_cookie(&mut self, cookie: &Cookie) -> Result<(), Error> {
        if !self.visited() {
            return Err(Error::cookie_rejected(format!(
                "invalid cookie domain: no document loaded for {}",
                cookie.name
            )));
        }
        if self.rejected.contains(&cookie.name) {
            return Err(Error::cookie_rejected(format!("unable to set cookie {}", cookie.name)));
        }

        let mut cookie = cookie.clone();
        if cookie.domain.is_empty() {
            cookie.domain = url::Url::parse(&self.url)
                .ok()
                .and_then(|u| u.host_str().map(|h| h.to_string()))
                .unwrap_or_default();
        }
        self.cookies.retain(|c| c.name != cookie.name);
        self.cookies.push(cookie);
        Ok(())
    }
}

/// Mock WebDriver client over a fake document
pub struct MockWebDriver {
    session_id: String,
    state: Mutex<MockState>,
}

impl fmt::Debug for MockWebDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockWebDriver")
            .field("session_id", &self.session_id)
            .finish()
    }
}

impl MockWebDriver {
    /// Create a mock whose documents come from `router`
    pub fn new<F>(router: F) -> Self
    where
        F: Fn(&MockRequest<'_>) -> MockDocument + Send + Sync + 'static,
    {
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            state: Mutex::new(MockState {
                router: Arc::new(router),
                url: "about:blank".to_string(),
                document: MockDocument::default(),
                generation: 0,
                cookies: Vec::new(),
                rejected: HashSet::new(),
                scroll_count: 0,
                closed: false,
                log: Vec::new(),
            }),
        }
    }

    /// Create a mock serving the same document for every URL
    pub fn with_document(document: MockDocument) -> Self {
        Self::new(move |_| document.clone())
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Log a command and fail if the session is gone
    fn begin(&self, command: String) -> Result<MutexGuard<'_, MockState>, Error> {
        let mut state = self.state();
        state.log.push(command);
        if state.closed {
            return Err(Error::session_closed(format!("Session {} is closed", self.session_id)));
        }
        Ok(state)
    }

    /// Make the browser reject cookies with this name
    pub fn reject_cookie<S: Into<String>>(&self, name: S) {
        self.state().rejected.insert(name.into());
    }

    /// Re-render the current document, invalidating every handle
    pub fn rerender(&self) {
        self.state().generation += 1;
    }

    /// Every command issued so far
    pub fn commands(&self) -> Vec<String> {
        self.state().log.clone()
    }

    /// Number of commands starting with `prefix`
    pub fn count(&self, prefix: &str) -> usize {
        self.state().log.iter().filter(|c| c.starts_with(prefix)).count()
    }

    /// URLs loaded through `navigate`, in order
    pub fn navigations(&self) -> Vec<String> {
        self.state()
            .log
            .iter()
            .filter_map(|c| c.strip_prefix("navigate ").map(|s| s.to_string()))
            .collect()
    }

    /// Scroll commands run on the current document
    pub fn scroll_count(&self) -> u32 {
        self.state().scroll_count
    }

    /// Current cookie jar
    pub fn cookie_jar(&self) -> Vec<Cookie> {
        self.state().cookies.clone()
    }

    /// Whether `close` was called
    pub fn is_closed(&self) -> bool {
        self.state().closed
    }

    /// Inner HTML of the first node with the given id attribute
    pub fn inner_html_of(&self, id: &str) -> Option<String> {
        let state = self.state();
        state
            .document
            .index_of(id)
            .map(|i| state.document.nodes[i].inner_html.clone())
    }
}

#[async_trait]
impl WebDriverClient for MockWebDriver {
    fn session_id(&self) -> &str {
        &self.session_id
    }

    async fn navigate(&self, url: &str) -> Result<(), Error> {
        let mut state = self.begin(format!("navigate {}", url))?;
        state.load(url);
        Ok(())
    }

    async fn current_url(&self) -> Result<String, Error> {
        let state = self.begin("current_url".to_string())?;
        Ok(state.url.clone())
    }

    async fn refresh(&self) -> Result<(), Error> {
        let mut state = self.begin("refresh".to_string())?;
        let url = state.url.clone();
        state.load(&url);
        Ok(())
    }

    async fn find_element(
        &self,
        using: LocatorStrategy,
        value: &str,
        root: Option<&WebElement>,
    ) -> Result<WebElement, Error> {
        let state = self.begin(format!("find {} {}", using, value))?;
        let root = root.map(|r| state.resolve(r)).transpose()?;
        state
            .matching(using, value, root)
            .first()
            .map(|&i| state.element(i))
            .ok_or_else(|| Error::element_not_found(format!("{} {}", using, value)))
    }

    async fn find_elements(
        &self,
        using: LocatorStrategy,
        value: &str,
        root: Option<&WebElement>,
    ) -> Result<Vec<WebElement>, Error> {
        let state = self.begin(format!("find_all {} {}", using, value))?;
        let root = root.map(|r| state.resolve(r)).transpose()?;
        Ok(state
            .matching(using, value, root)
            .into_iter()
            .map(|i| state.element(i))
            .collect())
    }

    async fn element_attribute(&self, element: &WebElement, name: &str) -> Result<Option<String>, Error> {
        let state = self.begin(format!("attribute {} {}", element.id(), name))?;
        let index = state.resolve(element)?;
        Ok(state.document.nodes[index].attribute(name).map(|s| s.to_string()))
    }

    async fn element_property(&self, element: &WebElement, name: &str) -> Result<Value, Error> {
        let state = self.begin(format!("property {} {}", element.id(), name))?;
        let node = &state.document.nodes[state.resolve(element)?];
        Ok(match name {
            "innerHTML" => Value::String(node.inner_html.clone()),
            "textContent" | "innerText" => Value::String(node.text.clone()),
            other => node.attribute(other).map(|v| json!(v)).unwrap_or(Value::Null),
        })
    }

    async fn element_text(&self, element: &WebElement) -> Result<String, Error> {
        let state = self.begin(format!("text {}", element.id()))?;
        let node = &state.document.nodes[state.resolve(element)?];
        Ok(if node.displayed { node.text.clone() } else { String::new() })
    }

    async fn element_tag_name(&self, element: &WebElement) -> Result<String, Error> {
        let state = self.begin(format!("tag_name {}", element.id()))?;
        Ok(state.document.nodes[state.resolve(element)?].tag.clone())
    }

    async fn element_rect(&self, element: &WebElement) -> Result<Rect, Error> {
        let state = self.begin(format!("rect {}", element.id()))?;
        let index = state.resolve(element)?;
        Ok(Rect {
            x: 0.0,
            y: index as f64 * 20.0,
            width: 100.0,
            height: 20.0,
        })
    }

    async fn element_displayed(&self, element: &WebElement) -> Result<bool, Error> {
        let state = self.begin(format!("displayed {}", element.id()))?;
        Ok(state.document.nodes[state.resolve(element)?].displayed)
    }

    async fn element_click(&self, element: &WebElement) -> Result<(), Error> {
        let mut state = self.begin(format!("click {}", element.id()))?;
        let index = state.resolve(element)?;
        let node = state.document.nodes[index].clone();

        if !node.displayed {
            return Err(Error::webdriver("element not interactable", format!("{} is not displayed", element.id())));
        }
        if node.click_fails {
            return Err(Error::webdriver(
                "element click intercepted",
                format!("Click on {} intercepted", element.id()),
            ));
        }

        for effect in node.on_click {
            match effect {
                ClickEffect::SetHtml { target, html } => {
                    if let Some(n) = state.document.nodes.get_mut(target) {
                        n.inner_html = html;
                    }
                }
                ClickEffect::AppendHtml { target, html } => {
                    if let Some(n) = state.document.nodes.get_mut(target) {
                        n.inner_html.push_str(&html);
                    }
                }
                ClickEffect::SetCookie(cookie) => {
                    state.cookies.retain(|c| c.name != cookie.name);
                    state.cookies.push(cookie);
                }
                ClickEffect::Navigate(url) => state.load(&url),
                ClickEffect::Rerender => state.generation += 1,
            }
        }
        Ok(())
    }

    async fn element_send_keys(&self, element: &WebElement, text: &str) -> Result<(), Error> {
        let mut state = self.begin(format!("send_keys {} {}", element.id(), text))?;
        let index = state.resolve(element)?;
        state.document.nodes[index]
            .attributes
            .entry("value".to_string())
            .or_default()
            .push_str(text);
        Ok(())
    }

    async fn execute_script(&self, script: &str, args: Vec<Value>) -> Result<Value, Error> {
        let mut state = self.begin(format!("script {}", script.trim().lines().next().unwrap_or_default()))?;

        let context = match args.first().and_then(WebElement::from_json) {
            Some(element) => Some(state.resolve(&element)?),
            None => None,
        };

        if script.contains("getElementXPath") {
            let index = context.ok_or_else(|| Error::script_execution_failed("getElementXPath needs an element"))?;
            return Ok(Value::String(state.positional_xpath(index)));
        }

        if script.contains("attributes.length") {
            let index = context.ok_or_else(|| Error::script_execution_failed("attributes needs an element"))?;
            let map: Map<String, Value> = state.document.nodes[index]
                .attributes
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect();
            return Ok(Value::Object(map));
        }

        if script.contains("scrollTop = 0") || script.contains("scrollTo(0, 0)") {
            return Ok(Value::Null);
        }

        if script.contains("scrollBy") || script.contains("scrollTop +=") || script.contains("scrollHeight") {
            state.scroll_count += 1;
        }

        Ok(Value::Null)
    }

    async fn get_cookies(&self) -> Result<Vec<Cookie>, Error> {
        let state = self.begin("get_cookies".to_string())?;
        Ok(state.cookies.clone())
    }

    async fn add_cookie(&self, cookie: &Cookie) -> Result<(), Error> {
        let mut state = self.begin(format!("add_cookie {}", cookie.name))?;
        state.add_cookie(cookie)
    }

    async fn close(&self) -> Result<(), Error> {
        let mut state = self.state();
        state.log.push("close".to_string());
        state.closed = true;
        Ok(())
    }
}

//! WebDriver wire protocol type definitions
//!
//! This module defines the data structures exchanged with a W3C WebDriver endpoint.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Key under which W3C WebDriver encodes element references
pub const ELEMENT_KEY: &str = "element-6066-11e4-a07a-4bc4fbfe8ac6";

/// Locator strategy understood by the remote end
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LocatorStrategy {
    #[serde(rename = "id")]
    Id,
    #[serde(rename = "class name")]
    ClassName,
    #[serde(rename = "tag name")]
    TagName,
    #[serde(rename = "name")]
    Name,
    #[serde(rename = "xpath")]
    XPath,
    #[serde(rename = "css selector")]
    CssSelector,
    #[serde(rename = "link text")]
    LinkText,
}

/// Operator-facing aliases for each strategy
static STRATEGY_ALIASES: phf::Map<&'static str, LocatorStrategy> = phf::phf_map! {
    "id" => LocatorStrategy::Id,
    "class" => LocatorStrategy::ClassName,
    "class name" => LocatorStrategy::ClassName,
    "class_name" => LocatorStrategy::ClassName,
    "tag" => LocatorStrategy::TagName,
    "tag name" => LocatorStrategy::TagName,
    "tag_name" => LocatorStrategy::TagName,
    "name" => LocatorStrategy::Name,
    "xpath" => LocatorStrategy::XPath,
    "css" => LocatorStrategy::CssSelector,
    "css selector" => LocatorStrategy::CssSelector,
    "css_selector" => LocatorStrategy::CssSelector,
    "link" => LocatorStrategy::LinkText,
    "link text" => LocatorStrategy::LinkText,
    "link_text" => LocatorStrategy::LinkText,
};

impl LocatorStrategy {
    /// All strategies in derivation order
    pub const ALL: [LocatorStrategy; 7] = [
        LocatorStrategy::Id,
        LocatorStrategy::ClassName,
        LocatorStrategy::TagName,
        LocatorStrategy::Name,
        LocatorStrategy::XPath,
        LocatorStrategy::CssSelector,
        LocatorStrategy::LinkText,
    ];

    /// Strategy name as sent over the wire
    pub fn as_wire(&self) -> &'static str {
        match self {
            LocatorStrategy::Id => "id",
            LocatorStrategy::ClassName => "class name",
            LocatorStrategy::TagName => "tag name",
            LocatorStrategy::Name => "name",
            LocatorStrategy::XPath => "xpath",
            LocatorStrategy::CssSelector => "css selector",
            LocatorStrategy::LinkText => "link text",
        }
    }
}

impl fmt::Display for LocatorStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

impl FromStr for LocatorStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase();
        STRATEGY_ALIASES
            .get(key.as_str())
            .copied()
            .ok_or_else(|| Error::configuration(format!("Unknown locator strategy: {}", s)))
    }
}

/// Remote element reference
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WebElement(pub String);

impl WebElement {
    /// Element id assigned by the remote end
    pub fn id(&self) -> &str {
        &self.0
    }

    /// Encode as a W3C element reference (script argument form)
    pub fn to_json(&self) -> Value {
        serde_json::json!({ ELEMENT_KEY: self.0 })
    }

    /// Decode a W3C element reference
    pub fn from_json(value: &Value) -> Option<Self> {
        value
            .get(ELEMENT_KEY)
            .and_then(|v| v.as_str())
            .map(|s| WebElement(s.to_string()))
    }
}

/// Element rectangle
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Browser cookie, also the on-disk cookie file record
///
/// Field order is the serialized key order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default = "default_cookie_path")]
    pub path: String,
    #[serde(
        default,
        deserialize_with = "deserialize_expiry",
        skip_serializing_if = "Option::is_none"
    )]
    pub expiry: Option<i64>,
    #[serde(default)]
    pub secure: bool,
    #[serde(default, rename = "httpOnly")]
    pub http_only: bool,
}

fn default_cookie_path() -> String {
    "/".to_string()
}

impl Cookie {
    /// Create a session cookie for the given domain
    pub fn new<N: Into<String>, V: Into<String>, D: Into<String>>(name: N, value: V, domain: D) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: domain.into(),
            path: default_cookie_path(),
            expiry: None,
            secure: false,
            http_only: false,
        }
    }

    /// Wire form for `POST /cookie`; an empty domain defers to the current document
    pub fn to_wire(&self) -> Value {
        let mut obj = serde_json::json!({
            "name": self.name,
            "value": self.value,
            "path": self.path,
            "secure": self.secure,
            "httpOnly": self.http_only,
        });
        if !self.domain.is_empty() {
            obj["domain"] = Value::String(self.domain.clone());
        }
        if let Some(expiry) = self.expiry {
            obj["expiry"] = Value::from(expiry);
        }
        obj
    }
}

/// Normalize an expiry written as integer, float or numeric string to epoch seconds
fn deserialize_expiry<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| normalize_expiry(&v)))
}

/// Integer epoch seconds from a loosely typed JSON value
pub fn normalize_expiry(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f.trunc() as i64))
        }
        _ => None,
    }
}

/// W3C error payload (`{"value": {"error": ..., "message": ...}}`)
#[derive(Debug, Clone, Deserialize)]
pub struct WebDriverErrorBody {
    /// Error code, e.g. "no such element"
    pub error: String,
    /// Human readable message
    #[serde(default)]
    pub message: String,
    /// Remote stack trace
    #[serde(default)]
    pub stacktrace: String,
}

impl WebDriverErrorBody {
    /// Map the W3C error code onto the crate's error kinds
    pub fn into_error(self) -> Error {
        match self.error.as_str() {
            "no such element" => Error::element_not_found(self.message),
            "stale element reference" => Error::stale(self.message),
            "timeout" | "script timeout" => Error::timeout(self.message),
            "invalid session id" => Error::session_closed(self.message),
            "unable to set cookie" | "invalid cookie domain" => Error::cookie_rejected(self.message),
            "javascript error" => Error::script_execution_failed(self.message),
            _ => Error::webdriver(self.error, self.message),
        }
    }
}

/// Response of `POST /session`
#[derive(Debug, Clone, Deserialize)]
pub struct NewSessionResponse {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    #[serde(default)]
    pub capabilities: Value,
}

/// Body of `POST /element` and friends
#[derive(Debug, Clone, Serialize)]
pub struct FindElementParams<'a> {
    pub using: LocatorStrategy,
    pub value: &'a str,
}

/// Body of `POST /execute/sync`
#[derive(Debug, Clone, Serialize)]
pub struct ExecuteScriptParams<'a> {
    pub script: &'a str,
    pub args: Vec<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_wire_names() {
        let names: Vec<&str> = LocatorStrategy::ALL.iter().map(|s| s.as_wire()).collect();
        assert_eq!(
            names,
            vec!["id", "class name", "tag name", "name", "xpath", "css selector", "link text"]
        );

        let json = serde_json::to_string(&LocatorStrategy::CssSelector).unwrap();
        assert_eq!(json, "\"css selector\"");
    }

    #[test]
    fn test_strategy_aliases() {
        assert_eq!("css".parse::<LocatorStrategy>().unwrap(), LocatorStrategy::CssSelector);
        assert_eq!("Class Name".parse::<LocatorStrategy>().unwrap(), LocatorStrategy::ClassName);
        assert_eq!(" xpath ".parse::<LocatorStrategy>().unwrap(), LocatorStrategy::XPath);
        assert!("partial link text".parse::<LocatorStrategy>().is_err());
    }

    #[test]
    fn test_element_reference_round_trip() {
        let element = WebElement("abc-123".to_string());
        let json = element.to_json();
        assert_eq!(json[ELEMENT_KEY], "abc-123");
        assert_eq!(WebElement::from_json(&json), Some(element));
        assert_eq!(WebElement::from_json(&serde_json::json!({"id": "x"})), None);
    }

    #[test]
    fn test_cookie_expiry_normalization() {
        let raw = r#"[
            {"name": "a", "value": "1", "domain": ".example.com", "path": "/", "expiry": 1712345678.9, "secure": true, "httpOnly": false},
            {"name": "b", "value": "2", "domain": ".example.com", "path": "/", "expiry": "1712345678", "secure": false, "httpOnly": true},
            {"name": "c", "value": "3", "domain": ".example.com"}
        ]"#;
        let cookies: Vec<Cookie> = serde_json::from_str(raw).unwrap();

        assert_eq!(cookies[0].expiry, Some(1712345678));
        assert_eq!(cookies[1].expiry, Some(1712345678));
        assert!(cookies[1].http_only);
        assert_eq!(cookies[2].expiry, None);
        assert_eq!(cookies[2].path, "/");
    }

    #[test]
    fn test_cookie_key_order() {
        let mut cookie = Cookie::new("li_at", "token", ".example.com");
        cookie.expiry = Some(42);
        let json = serde_json::to_string(&cookie).unwrap();
        assert_eq!(
            json,
            r#"{"name":"li_at","value":"token","domain":".example.com","path":"/","expiry":42,"secure":false,"httpOnly":false}"#
        );
    }

    #[test]
    fn test_cookie_wire_omits_empty_domain() {
        let cookie = Cookie::new("a", "b", "");
        let wire = cookie.to_wire();
        assert!(wire.get("domain").is_none());
        assert!(wire.get("expiry").is_none());
        assert_eq!(wire["httpOnly"], false);
    }

    #[test]
    fn test_error_mapping() {
        let body = |code: &str| WebDriverErrorBody {
            error: code.to_string(),
            message: "m".to_string(),
            stacktrace: String::new(),
        };

        assert!(matches!(body("no such element").into_error(), Error::ElementNotFound(_)));
        assert!(matches!(body("stale element reference").into_error(), Error::StaleElement(_)));
        assert!(matches!(body("script timeout").into_error(), Error::Timeout(_)));
        assert!(matches!(body("invalid session id").into_error(), Error::SessionClosed(_)));
        assert!(matches!(body("unable to set cookie").into_error(), Error::CookieRejected(_)));
        assert!(matches!(
            body("element click intercepted").into_error(),
            Error::WebDriver { code, .. } if code == "element click intercepted"
        ));
    }
}

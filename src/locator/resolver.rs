//! Locator derivation from live elements
//!
//! [`LocatorResolver`] asks an [`ElementIntrospection`] source for everything
//! it needs (attributes, tag, text, injected scripts) and turns the answers
//! into one descriptor per applicable strategy.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, instrument};

use super::descriptor::{rank_best, LocatorDescriptor};
use crate::scripts::{ATTRIBUTES_SCRIPT, XPATH_SCRIPT};
use crate::session::ElementHandle;
use crate::webdriver::{LocatorStrategy, Rect};
use crate::Result;

/// Read-only element queries needed to derive locators
///
/// Implemented by the session manager; tests provide their own fakes.
#[async_trait]
pub trait ElementIntrospection: Send + Sync {
    /// Content attribute, `None` when absent
    async fn attribute(&self, element: &ElementHandle, name: &str) -> Result<Option<String>>;

    /// Lowercase tag name
    async fn tag_name(&self, element: &ElementHandle) -> Result<String>;

    /// Rendered text
    async fn text(&self, element: &ElementHandle) -> Result<String>;

    /// Position and size
    async fn rect(&self, element: &ElementHandle) -> Result<Rect>;

    /// Run a script with the element as `arguments[0]`
    async fn execute_script(&self, script: &str, element: Option<&ElementHandle>) -> Result<Value>;
}

/// Attribute map, text and geometry of one element
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementSnapshot {
    pub attributes: BTreeMap<String, String>,
    pub text: String,
    pub rect: Rect,
}

/// Everything known about how to find one element
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocatorReport {
    pub descriptors: Vec<LocatorDescriptor>,
    pub best: Option<LocatorDescriptor>,
    pub relative: Option<LocatorDescriptor>,
    pub snapshot: Option<ElementSnapshot>,
}

impl fmt::Display for LocatorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Locators:")?;
        for descriptor in &self.descriptors {
            writeln!(f, "  [{}] {}", descriptor.priority, descriptor)?;
        }
        match &self.best {
            Some(best) => writeln!(f, "Best: {}", best)?,
            None => writeln!(f, "Best: <none>")?,
        }
        if let Some(relative) = &self.relative {
            writeln!(f, "Relative: {}", relative)?;
        }
        if let Some(snapshot) = &self.snapshot {
            writeln!(f, "Attributes:")?;
            for (name, value) in &snapshot.attributes {
                writeln!(f, "  {} = {}", name, value)?;
            }
            writeln!(f, "Text: {}", snapshot.text)?;
            writeln!(
                f,
                "Rect: x={} y={} width={} height={}",
                snapshot.rect.x, snapshot.rect.y, snapshot.rect.width, snapshot.rect.height
            )?;
        }
        Ok(())
    }
}

/// Derives and ranks locators for live elements
#[derive(Debug, Clone, Copy, Default)]
pub struct LocatorResolver;

impl LocatorResolver {
    /// One descriptor per strategy that currently applies to `element`
    ///
    /// Each step runs on its own; a step that fails only drops its own
    /// descriptor. Output follows [`LocatorStrategy::ALL`] order.
    #[instrument(skip(source))]
    pub async fn derive_all<I>(source: &I, element: &ElementHandle) -> Vec<LocatorDescriptor>
    where
        I: ElementIntrospection + ?Sized,
    {
        let id = non_empty(source.attribute(element, "id").await);
        let first_class = non_empty(source.attribute(element, "class").await)
            .and_then(|c| c.split_whitespace().next().map(|s| s.to_string()));
        let tag = match source.tag_name(element).await {
            Ok(tag) if !tag.is_empty() => Some(tag.to_lowercase()),
            Ok(_) => None,
            Err(e) => {
                debug!("Tag name unavailable: {}", e);
                None
            }
        };
        let name = non_empty(source.attribute(element, "name").await);

        let xpath = match &id {
            Some(id) => Some(format!("//*[@id='{}']", id)),
            None => match source.execute_script(XPATH_SCRIPT, Some(element)).await {
                Ok(Value::String(path)) if !path.is_empty() => Some(path),
                Ok(_) => None,
                Err(e) => {
                    debug!("XPath synthesis failed: {}", e);
                    None
                }
            },
        };

        let css = id
            .as_ref()
            .map(|id| format!("#{}", id))
            .or_else(|| first_class.as_ref().map(|c| format!(".{}", c)))
            .or_else(|| tag.clone());

        let link_text = if tag.as_deref() == Some("a") {
            source
                .text(element)
                .await
                .ok()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
        } else {
            None
        };

        let candidates = [
            (LocatorStrategy::Id, id),
            (LocatorStrategy::ClassName, first_class),
            (LocatorStrategy::TagName, tag),
            (LocatorStrategy::Name, name),
            (LocatorStrategy::XPath, xpath),
            (LocatorStrategy::CssSelector, css),
            (LocatorStrategy::LinkText, link_text),
        ];

        candidates
            .into_iter()
            .filter_map(|(strategy, value)| value.map(|v| LocatorDescriptor::new(strategy, v)))
            .collect()
    }

    /// Full attribute map, trimmed text and rect
    pub async fn snapshot<I>(source: &I, element: &ElementHandle) -> Result<ElementSnapshot>
    where
        I: ElementIntrospection + ?Sized,
    {
        let attributes = match source.execute_script(ATTRIBUTES_SCRIPT, Some(element)).await? {
            Value::Object(map) => map
                .into_iter()
                .map(|(k, v)| {
                    let value = match v {
                        Value::String(s) => s,
                        other => other.to_string(),
                    };
                    (k, value)
                })
                .collect(),
            _ => BTreeMap::new(),
        };

        Ok(ElementSnapshot {
            attributes,
            text: source.text(element).await?.trim().to_string(),
            rect: source.rect(element).await?,
        })
    }

    /// Descriptors, best pick, its relative form and a snapshot when available
    pub async fn report<I>(source: &I, element: &ElementHandle) -> LocatorReport
    where
        I: ElementIntrospection + ?Sized,
    {
        let descriptors = Self::derive_all(source, element).await;
        let best = rank_best(&descriptors).cloned();
        let relative = best.as_ref().map(|b| b.to_relative());
        let snapshot = Self::snapshot(source, element).await.ok();

        LocatorReport {
            descriptors,
            best,
            relative,
            snapshot,
        }
    }
}

fn non_empty(value: Result<Option<String>>) -> Option<String> {
    match value {
        Ok(Some(v)) if !v.trim().is_empty() => Some(v.trim().to_string()),
        Ok(_) => None,
        Err(e) => {
            debug!("Attribute unavailable: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::webdriver::WebElement;
    use crate::Error;
    use serde_json::json;

    /// Introspection over a fixed attribute set
    struct FakeElement {
        tag: &'static str,
        attributes: BTreeMap<&'static str, &'static str>,
        text: &'static str,
        xpath: Option<&'static str>,
    }

    #[async_trait]
    impl ElementIntrospection for FakeElement {
        async fn attribute(&self, _: &ElementHandle, name: &str) -> Result<Option<String>> {
            Ok(self.attributes.get(name).map(|v| v.to_string()))
        }

        async fn tag_name(&self, _: &ElementHandle) -> Result<String> {
            Ok(self.tag.to_string())
        }

        async fn text(&self, _: &ElementHandle) -> Result<String> {
            Ok(self.text.to_string())
        }

        async fn rect(&self, _: &ElementHandle) -> Result<Rect> {
            Ok(Rect {
                x: 1.0,
                y: 2.0,
                width: 3.0,
                height: 4.0,
            })
        }

        async fn execute_script(&self, script: &str, _: Option<&ElementHandle>) -> Result<Value> {
            if script.contains("getElementXPath") {
                return self
                    .xpath
                    .map(|p| json!(p))
                    .ok_or_else(|| Error::script_execution_failed("detached"));
            }
            Ok(json!(self.attributes))
        }
    }

    fn handle() -> ElementHandle {
        ElementHandle::new(WebElement("e-1".to_string()), 1)
    }

    fn strategies(descriptors: &[LocatorDescriptor]) -> Vec<LocatorStrategy> {
        descriptors.iter().map(|d| d.strategy).collect()
    }

    #[tokio::test]
    async fn test_derive_all_with_id() {
        let element = FakeElement {
            tag: "INPUT",
            attributes: BTreeMap::from([
                ("id", "session_key"),
                ("class", "input  input--email"),
                ("name", "session_key"),
            ]),
            text: "",
            xpath: None,
        };

        let descriptors = LocatorResolver::derive_all(&element, &handle()).await;

        assert_eq!(
            strategies(&descriptors),
            vec![
                LocatorStrategy::Id,
                LocatorStrategy::ClassName,
                LocatorStrategy::TagName,
                LocatorStrategy::Name,
                LocatorStrategy::XPath,
                LocatorStrategy::CssSelector,
            ]
        );
        assert_eq!(descriptors[1].value, "input");
        assert_eq!(descriptors[2].value, "input");
        assert_eq!(descriptors[4].value, "//*[@id='session_key']");
        assert_eq!(descriptors[5].value, "#session_key");
    }

    #[tokio::test]
    async fn test_derive_all_synthesizes_xpath_and_link_text() {
        let element = FakeElement {
            tag: "a",
            attributes: BTreeMap::from([("class", "pager-link")]),
            text: "  Next  ",
            xpath: Some("/html/body/div[1]/a[2]"),
        };

        let descriptors = LocatorResolver::derive_all(&element, &handle()).await;
        let by = |s: LocatorStrategy| descriptors.iter().find(|d| d.strategy == s).map(|d| d.value.clone());

        assert_eq!(by(LocatorStrategy::Id), None);
        assert_eq!(by(LocatorStrategy::XPath).as_deref(), Some("/html/body/div[1]/a[2]"));
        assert_eq!(by(LocatorStrategy::CssSelector).as_deref(), Some(".pager-link"));
        assert_eq!(by(LocatorStrategy::LinkText).as_deref(), Some("Next"));
        assert_eq!(rank_best(&descriptors).unwrap().strategy, LocatorStrategy::ClassName);
    }

    #[tokio::test]
    async fn test_failed_step_drops_only_its_descriptor() {
        let element = FakeElement {
            tag: "li",
            attributes: BTreeMap::new(),
            text: "card",
            xpath: None,
        };

        let descriptors = LocatorResolver::derive_all(&element, &handle()).await;

        // No XPath, no id, no class: tag name and the tag-based CSS remain
        assert_eq!(
            strategies(&descriptors),
            vec![LocatorStrategy::TagName, LocatorStrategy::CssSelector]
        );
        assert_eq!(descriptors[1].value, "li");
    }

    #[tokio::test]
    async fn test_report_includes_snapshot() {
        let element = FakeElement {
            tag: "div",
            attributes: BTreeMap::from([("id", "job-details"), ("data-role", "panel")]),
            text: " Senior Analyst ",
            xpath: None,
        };

        let report = LocatorResolver::report(&element, &handle()).await;

        assert_eq!(report.best.as_ref().unwrap().value, "job-details");
        let snapshot = report.snapshot.as_ref().unwrap();
        assert_eq!(snapshot.attributes.get("data-role").map(String::as_str), Some("panel"));
        assert_eq!(snapshot.text, "Senior Analyst");

        let rendered = report.to_string();
        assert!(rendered.contains("Best: id=job-details"));
        assert!(rendered.contains("data-role = panel"));
    }
}

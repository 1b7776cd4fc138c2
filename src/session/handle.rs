//! Element handle
//!
//! A remote element reference stamped with the page epoch it was found in.

use crate::webdriver::WebElement;

/// Reference to a live DOM node, valid only within its page epoch
///
/// The session bumps its epoch on every navigation and every detected
/// staleness; operations on a handle from an older epoch fail with
/// [`crate::Error::StaleElement`] instead of reaching the browser.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementHandle {
    element: WebElement,
    epoch: u64,
}

impl ElementHandle {
    pub fn new(element: WebElement, epoch: u64) -> Self {
        Self { element, epoch }
    }

    /// Underlying remote reference
    pub fn element(&self) -> &WebElement {
        &self.element
    }

    /// Page epoch the handle was resolved in
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Remote element id
    pub fn id(&self) -> &str {
        self.element.id()
    }
}

//! Scroll controller
//!
//! Scrolls the window or a scrollable container to make lazily rendered
//! content materialize.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::locator::LocatorDescriptor;
use crate::scripts::{
    scroll_by_script, ELEMENT_SCROLL_BOTTOM_SCRIPT, ELEMENT_SCROLL_TOP_SCRIPT, SCROLL_INTO_VIEW_SCRIPT,
    WINDOW_SCROLL_BOTTOM_SCRIPT, WINDOW_SCROLL_TOP_SCRIPT,
};
use crate::session::{ElementHandle, SessionManager};
use crate::Result;

/// Scroll direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollDirection {
    Up,
    Down,
    Top,
    Bottom,
}

/// Bounds for scroll-then-poll loops
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollPoll {
    /// Scroll+poll cycles before giving up
    pub max_attempts: u32,
    /// Pause after each scroll
    pub poll_interval: Duration,
    /// Pixels per scroll
    pub step: i64,
}

impl Default for ScrollPoll {
    fn default() -> Self {
        Self {
            max_attempts: 20,
            poll_interval: Duration::from_secs(2),
            step: 300,
        }
    }
}

/// Issues scroll commands through the session
#[derive(Debug, Clone)]
pub struct ScrollController {
    session: Arc<SessionManager>,
}

impl ScrollController {
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self { session }
    }

    /// Scroll the window, or `target`'s own scroll offset when given
    ///
    /// `Up`/`Down` move by `amount` pixels; `Top`/`Bottom` ignore it.
    pub async fn scroll(&self, direction: ScrollDirection, amount: i64, target: Option<&ElementHandle>) -> Result<()> {
        let on_element = target.is_some();
        let script = match direction {
            ScrollDirection::Up => scroll_by_script(-amount.abs(), on_element),
            ScrollDirection::Down => scroll_by_script(amount.abs(), on_element),
            ScrollDirection::Top if on_element => ELEMENT_SCROLL_TOP_SCRIPT.to_string(),
            ScrollDirection::Top => WINDOW_SCROLL_TOP_SCRIPT.to_string(),
            ScrollDirection::Bottom if on_element => ELEMENT_SCROLL_BOTTOM_SCRIPT.to_string(),
            ScrollDirection::Bottom => WINDOW_SCROLL_BOTTOM_SCRIPT.to_string(),
        };

        debug!("Scrolling {:?} by {} (element: {})", direction, amount, on_element);
        self.session.execute_script(&script, target).await?;
        Ok(())
    }

    /// Bring `handle` to the middle of the viewport
    pub async fn scroll_into_view(&self, handle: &ElementHandle) -> Result<()> {
        self.session.execute_script(SCROLL_INTO_VIEW_SCRIPT, Some(handle)).await?;
        Ok(())
    }

    /// Scroll down step by step until `watch_for` is displayed
    ///
    /// Returns `false` right away when there is nothing to watch, and after
    /// exactly `max_attempts` scroll+poll cycles without a sighting.
    #[instrument(skip(self, target, watch_for))]
    pub async fn scroll_until_visible(
        &self,
        target: Option<&ElementHandle>,
        watch_for: Option<&ElementHandle>,
        poll: &ScrollPoll,
    ) -> Result<bool> {
        let Some(watch_for) = watch_for else {
            return Ok(false);
        };

        for attempt in 1..=poll.max_attempts {
            self.scroll(ScrollDirection::Down, poll.step, target).await?;
            tokio::time::sleep(poll.poll_interval).await;

            match self.session.is_displayed(watch_for).await {
                Ok(true) => {
                    debug!("Watched element visible after {} scrolls", attempt);
                    return Ok(true);
                }
                Ok(false) => {}
                Err(e) => debug!("Visibility check failed: {}", e),
            }
        }

        Ok(false)
    }

    /// Scroll down step by step until `locator` matches something
    ///
    /// Checks once before scrolling, then after each of at most
    /// `max_attempts` scroll+poll cycles.
    #[instrument(skip(self, target))]
    pub async fn scroll_until_located(
        &self,
        target: Option<&ElementHandle>,
        locator: &LocatorDescriptor,
        poll: &ScrollPoll,
    ) -> Result<Option<ElementHandle>> {
        if let Some(found) = self.session.find_element(locator, None).await? {
            return Ok(Some(found));
        }

        for attempt in 1..=poll.max_attempts {
            self.scroll(ScrollDirection::Down, poll.step, target).await?;
            tokio::time::sleep(poll.poll_interval).await;

            if let Some(found) = self.session.find_element(locator, None).await? {
                debug!("{} materialized after {} scrolls", locator, attempt);
                return Ok(Some(found));
            }
        }

        Ok(None)
    }
}

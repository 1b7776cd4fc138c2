//! Element locator
//!
//! Bounded-wait element lookup with one-shot stale recovery. Keeps the most
//! recently located element so follow-up actions can omit the handle.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

use crate::locator::LocatorDescriptor;
use crate::session::{ElementHandle, SessionManager};
use crate::{Error, Result};

/// Finds elements with bounded waits and recovers from staleness
#[derive(Debug)]
pub struct ElementLocator {
    session: Arc<SessionManager>,
    last: Option<ElementHandle>,
    poll_interval: Duration,
    fallback_wait: Duration,
    settle: Duration,
}

impl ElementLocator {
    /// Create a locator
    ///
    /// # Arguments
    /// * `poll_interval` - pause between presence checks while waiting
    /// * `fallback_wait` - wait budget when re-resolving a fallback locator
    /// * `settle` - pause after every click and keystroke batch
    pub fn new(
        session: Arc<SessionManager>,
        poll_interval: Duration,
        fallback_wait: Duration,
        settle: Duration,
    ) -> Self {
        Self {
            session,
            last: None,
            poll_interval,
            fallback_wait,
            settle,
        }
    }

    /// Most recently located or acted-on element
    pub fn last_located(&self) -> Option<&ElementHandle> {
        self.last.as_ref()
    }

    /// Forget the last located element
    pub fn clear(&mut self) {
        self.last = None;
    }

    /// Wait up to `wait` for an element matching `locator`
    ///
    /// Returns `None` on timeout; that is an expected outcome, not an error.
    pub async fn find(&mut self, locator: &LocatorDescriptor, wait: Duration) -> Result<Option<ElementHandle>> {
        self.poll(locator, None, wait).await
    }

    /// Like [`ElementLocator::find`], restricted to descendants of `root`
    pub async fn find_within(
        &mut self,
        locator: &LocatorDescriptor,
        root: &ElementHandle,
        wait: Duration,
    ) -> Result<Option<ElementHandle>> {
        self.poll(locator, Some(root), wait).await
    }

    #[instrument(skip(self, root))]
    async fn poll(
        &mut self,
        locator: &LocatorDescriptor,
        root: Option<&ElementHandle>,
        wait: Duration,
    ) -> Result<Option<ElementHandle>> {
        let start = Instant::now();

        loop {
            if let Some(handle) = self.session.find_element(locator, root).await? {
                debug!("Located {} after {:?}", locator, start.elapsed());
                self.last = Some(handle.clone());
                return Ok(Some(handle));
            }

            let elapsed = start.elapsed();
            if elapsed >= wait {
                warn!("Element not found within {}ms: {}", wait.as_millis(), locator);
                return Ok(None);
            }

            tokio::time::sleep(self.poll_interval.min(wait - elapsed)).await;
        }
    }

    /// Click `handle` (or the last located element)
    ///
    /// A stale handle is re-resolved through `fallback` and clicked exactly
    /// once more. Without a fallback, or when the retry fails too, the result
    /// is [`Error::StaleElement`]. Returns the handle that was clicked.
    #[instrument(skip(self, handle))]
    pub async fn click(
        &mut self,
        handle: Option<&ElementHandle>,
        fallback: Option<&LocatorDescriptor>,
    ) -> Result<ElementHandle> {
        let target = self.target(handle)?;

        let clicked = match self.session.click(&target).await {
            Ok(()) => target,
            Err(Error::StaleElement(message)) => {
                let Some(fallback) = fallback else {
                    return Err(Error::stale(message));
                };
                warn!("Stale click on {}, re-resolving {}", target.id(), fallback);

                let fresh = self
                    .find(fallback, self.fallback_wait)
                    .await?
                    .ok_or_else(|| Error::stale(format!("{} (fallback {} matched nothing)", message, fallback)))?;

                if let Err(e) = self.session.click(&fresh).await {
                    return Err(Error::stale(format!("Retry via {} failed: {}", fallback, e)));
                }
                fresh
            }
            Err(e) => return Err(e),
        };

        self.last = Some(clicked.clone());
        self.settle().await;
        Ok(clicked)
    }

    /// Type into `handle` (or the last located element)
    #[instrument(skip(self, handle, text))]
    pub async fn send_keys(&mut self, handle: Option<&ElementHandle>, text: &str) -> Result<()> {
        let target = self.target(handle)?;
        self.session.send_keys(&target, text).await?;
        self.last = Some(target);
        self.settle().await;
        Ok(())
    }

    fn target(&self, handle: Option<&ElementHandle>) -> Result<ElementHandle> {
        handle
            .or(self.last.as_ref())
            .cloned()
            .ok_or_else(|| Error::element_not_found("No element given and none located yet"))
    }

    async fn settle(&self) {
        if !self.settle.is_zero() {
            tokio::time::sleep(self.settle).await;
        }
    }
}

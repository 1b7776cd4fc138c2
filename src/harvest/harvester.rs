//! Pagination harvester
//!
//! Drives one session through login, page-by-page identifier discovery and
//! per-record detail extraction, emitting each record to a [`RecordSink`].

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::cards::{extract_cards, CardRef};
use super::sink::RecordSink;
use super::state::{HarvestState, PageState, Record};
use super::summary::HarvestSummary;
use crate::config::{Config, HarvestConfig, SiteConfig, TimeoutConfig};
use crate::element::{ElementLocator, ScrollController, ScrollDirection};
use crate::locator::{ElementIntrospection, LocatorDescriptor};
use crate::retry::RetryPolicy;
use crate::session::{ElementHandle, SessionManager};
use crate::webdriver::LocatorStrategy;
use crate::{Error, Result};

/// Collapse whitespace and lowercase, for comparing visible labels
pub fn normalize_label(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// The orchestrating harvest state machine
///
/// Holds the session and an element locator; never the raw browser client.
#[derive(Debug)]
pub struct PaginationHarvester {
    session: Arc<SessionManager>,
    locator: ElementLocator,
    scroller: ScrollController,
    site: SiteConfig,
    harvest: HarvestConfig,
    timeouts: TimeoutConfig,
    login_retry: RetryPolicy,
    page_retry: RetryPolicy,
    state: HarvestState,
    page: PageState,
    start_page: u32,
    summary: HarvestSummary,
}

impl PaginationHarvester {
    pub fn new(session: Arc<SessionManager>, config: &Config) -> Self {
        let timeouts = config.timeouts.clone();
        let locator = ElementLocator::new(
            session.clone(),
            timeouts.poll_interval(),
            timeouts.default_wait(),
            timeouts.action_settle(),
        );
        let start_page = config.harvest.start_page;

        Self {
            scroller: ScrollController::new(session.clone()),
            session,
            locator,
            site: config.site.clone(),
            harvest: config.harvest.clone(),
            login_retry: RetryPolicy::fixed(timeouts.login_attempts, timeouts.login_reload_pause()),
            page_retry: RetryPolicy::fixed(timeouts.page_load_attempts, Duration::ZERO),
            timeouts,
            state: HarvestState::Idle,
            page: PageState::new(start_page, BTreeSet::new()),
            start_page,
            summary: HarvestSummary::new(start_page),
        }
    }

    /// Continue an earlier run from its last page, skipping what it harvested
    ///
    /// Identifiers whose extraction failed are eligible again.
    pub fn resume(mut self, previous: &HarvestSummary) -> Self {
        info!(
            "Resuming from page {} with {} harvested identifiers ({} pending, {} failed)",
            previous.last_page_index,
            previous.harvested_identifiers.len(),
            previous.pending_identifiers().len(),
            previous.failed_identifiers.len()
        );
        self.start_page = previous.last_page_index;
        self.page = PageState::new(previous.last_page_index, previous.resumable_identifiers());
        self.summary = HarvestSummary::new(previous.last_page_index);
        self
    }

    pub fn state(&self) -> &HarvestState {
        &self.state
    }

    pub fn seen_identifiers(&self) -> &BTreeSet<String> {
        self.page.seen_identifiers()
    }

    pub fn summary(&self) -> &HarvestSummary {
        &self.summary
    }

    fn transition(&mut self, next: HarvestState) -> Result<()> {
        if !self.state.can_transition_to(&next) {
            return Err(Error::internal(format!(
                "Illegal harvest transition {} -> {}",
                self.state, next
            )));
        }

        match &next {
            HarvestState::DetailExtracting(_) | HarvestState::Exporting(_) => {
                debug!("Harvest state {} -> {}", self.state, next)
            }
            _ => info!("Harvest state {} -> {}", self.state, next),
        }

        self.state = next;
        self.summary.state = self.state.clone();
        Ok(())
    }

    async fn pause(duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }

    /// Run the harvest to completion, failure or cancellation
    ///
    /// The session is closed on every path. On failure the returned
    /// [`Error::Harvest`] carries the summary of what was collected.
    #[instrument(skip(self, sink, cancel))]
    pub async fn run(&mut self, sink: &mut dyn RecordSink, cancel: &CancellationToken) -> Result<HarvestSummary> {
        self.summary.started_at = chrono::Utc::now();
        let outcome = self.drive(sink, cancel).await;

        if let Err(e) = self.session.close().await {
            warn!("Failed to close session: {}", e);
        }

        self.summary.seen_identifiers = self.page.seen_identifiers().clone();
        self.summary.finished_at = Some(chrono::Utc::now());

        let pending = self.summary.pending_identifiers().len();
        if pending > 0 {
            info!("{} discovered identifiers left for a resumed run", pending);
        }

        match outcome {
            Ok(()) => {
                self.transition(HarvestState::Done)?;
                self.save_summary().await;
                info!("Harvest finished: {}", self.summary);
                Ok(self.summary.clone())
            }
            Err(e) => {
                self.state = HarvestState::Failed;
                self.summary.state = HarvestState::Failed;
                self.summary.error = Some(e.to_string());
                self.save_summary().await;
                warn!("Harvest failed: {}", self.summary);
                Err(Error::harvest(self.summary.clone(), e))
            }
        }
    }

    async fn save_summary(&self) {
        let Some(path) = &self.harvest.summary_file else {
            return;
        };
        match self.summary.save(path).await {
            Ok(()) => debug!("Summary written to {}", path.display()),
            Err(e) => warn!("Failed to write summary to {}: {}", path.display(), e),
        }
    }

    async fn drive(&mut self, sink: &mut dyn RecordSink, cancel: &CancellationToken) -> Result<()> {
        self.transition(HarvestState::Navigating)?;
        let base_url = self.site.base_url.clone();
        self.session.navigate(&base_url).await?;

        if self.harvest.require_login {
            self.login().await?;
        } else {
            self.transition(HarvestState::LoggedIn)?;
        }

        let end = self.start_page.saturating_add(self.harvest.page_count);
        'pages: for page_index in self.start_page..end {
            if cancel.is_cancelled() {
                info!("Cancelled before page {}", page_index);
                self.summary.cancelled = true;
                break;
            }

            self.transition(HarvestState::HarvestingPage(page_index))?;
            self.summary.last_page_index = page_index;

            let cards = self.discover_page(page_index).await?;
            if cards.is_empty() && self.harvest.stop_on_empty_page {
                info!("Page {} yielded no new identifiers, stopping", page_index);
                self.summary.pages_completed += 1;
                break;
            }

            for card in cards {
                if cancel.is_cancelled() {
                    info!("Cancelled on page {} before {}", page_index, card.identifier);
                    self.summary.cancelled = true;
                    break 'pages;
                }

                self.transition(HarvestState::DetailExtracting(card.identifier.clone()))?;
                match self.extract_detail(&card).await {
                    Ok(Some(html)) => {
                        self.transition(HarvestState::Exporting(card.identifier.clone()))?;
                        sink.accept(Record::new(card.identifier.clone(), html, page_index)).await?;
                        self.summary.records_harvested += 1;
                        self.summary.harvested_identifiers.insert(card.identifier);
                    }
                    Ok(None) => {
                        warn!("No detail captured for {}", card.identifier);
                        self.summary.failed_identifiers.push(card.identifier);
                    }
                    Err(e @ (Error::SessionClosed(_) | Error::Http(_))) => return Err(e),
                    Err(e) => {
                        warn!("Detail extraction failed for {}: {}", card.identifier, e);
                        self.summary.failed_identifiers.push(card.identifier);
                    }
                }
            }

            self.summary.pages_completed += 1;
        }

        sink.finish().await
    }

    /// Sign in, preferring a saved cookie jar over credentials
    #[instrument(skip(self))]
    pub async fn login(&mut self) -> Result<()> {
        self.transition(HarvestState::AwaitingLogin)?;

        let cookie_file = self.harvest.cookie_file.clone();
        let mut confirmed = false;

        if let Some(path) = cookie_file.as_deref().filter(|p| p.exists()) {
            confirmed = self.login_with_cookies(path).await?;
        }

        if !confirmed {
            self.login_with_credentials().await?;
            if !self.confirm_login().await? {
                return Err(Error::login_failure(format!(
                    "Job list did not appear after {} attempts",
                    self.login_retry.max_attempts
                )));
            }
        }

        self.transition(HarvestState::LoggedIn)?;

        if let Some(path) = cookie_file {
            self.save_cookies(&path).await;
        }
        Ok(())
    }

    async fn save_cookies(&self, path: &Path) {
        if let Err(e) = self.session.save_cookies(path).await {
            warn!("Failed to save cookies to {}: {}", path.display(), e);
        }
    }

    async fn login_with_cookies(&mut self, path: &Path) -> Result<bool> {
        let base_url = self.site.base_url.clone();
        match self.session.load_cookies(path, Some(&base_url)).await {
            Ok(report) => {
                if !report.rejected.is_empty() {
                    warn!("Browser rejected cookies: {}", report.rejected.join(", "));
                }
            }
            Err(e @ (Error::SessionClosed(_) | Error::Http(_))) => return Err(e),
            Err(e) => {
                warn!("Cannot use cookie file {}: {}", path.display(), e);
                return Ok(false);
            }
        }

        let confirmed = self.confirm_login().await?;
        if confirmed {
            info!("Logged in with saved cookies");
        } else {
            warn!("Saved cookies did not restore the login, falling back to credentials");
        }
        Ok(confirmed)
    }

    async fn login_with_credentials(&mut self) -> Result<()> {
        let (email, password) = self
            .harvest
            .credentials()
            .map(|(e, p)| (e.to_string(), p.to_string()))
            .ok_or_else(|| {
                Error::login_failure("No credentials configured (set HARVEST_EMAIL and HARVEST_PASSWORD)")
            })?;

        let trigger_locator = self.site.login_trigger.descriptor();
        let trigger = self.wait_for_login_trigger().await?;
        self.locator.click(Some(&trigger), Some(&trigger_locator)).await?;

        let email_locator = self.site.email_input.descriptor();
        let email_input = self.require_login_element(&email_locator).await?;
        self.locator.send_keys(Some(&email_input), &email).await?;

        let password_locator = self.site.password_input.descriptor();
        let password_input = self.require_login_element(&password_locator).await?;
        self.locator.send_keys(Some(&password_input), &password).await?;

        let submit_locator = self.site.submit_button.descriptor();
        let submit = self.require_login_element(&submit_locator).await?;
        self.locator.click(Some(&submit), Some(&submit_locator)).await?;

        info!("Credentials submitted");
        Ok(())
    }

    async fn require_login_element(&mut self, locator: &LocatorDescriptor) -> Result<ElementHandle> {
        self.locator
            .find(locator, self.timeouts.long_wait())
            .await?
            .ok_or_else(|| Error::login_failure(format!("Sign-in form element missing: {}", locator)))
    }

    /// Wait for the login prompt, reloading the base URL between attempts
    async fn wait_for_login_trigger(&mut self) -> Result<ElementHandle> {
        let trigger = self.site.login_trigger.descriptor();
        let base_url = self.site.base_url.clone();

        for attempt in self.login_retry.attempts() {
            if let Some(handle) = self.locator.find(&trigger, self.timeouts.long_wait()).await? {
                return Ok(handle);
            }

            warn!(
                "Login prompt not found (attempt {}/{})",
                attempt, self.login_retry.max_attempts
            );
            if self.login_retry.is_last(attempt) {
                break;
            }
            self.session.navigate(&base_url).await?;
            self.login_retry.pause(attempt).await;
        }

        Err(Error::login_failure(format!(
            "Login prompt {} never appeared",
            trigger
        )))
    }

    /// Whether the logged-in content signal (the job list) is present
    ///
    /// Reloads between attempts; `false` once attempts are exhausted.
    pub async fn confirm_login(&mut self) -> Result<bool> {
        let job_list = self.site.job_list.descriptor();

        for attempt in self.login_retry.attempts() {
            if self.locator.find(&job_list, self.timeouts.long_wait()).await?.is_some() {
                info!("Login confirmed");
                return Ok(true);
            }
            if self.login_retry.is_last(attempt) {
                break;
            }
            warn!("Job list missing, reloading (attempt {}/{})", attempt, self.login_retry.max_attempts);
            self.session.reload().await?;
        }

        Ok(false)
    }

    /// Locate the job list, reloading a bounded number of times
    async fn locate_job_list(&mut self) -> Result<ElementHandle> {
        let job_list = self.site.job_list.descriptor();

        for attempt in self.page_retry.attempts() {
            if let Some(handle) = self.locator.find(&job_list, self.timeouts.long_wait()).await? {
                return Ok(handle);
            }
            if self.page_retry.is_last(attempt) {
                break;
            }
            warn!("Job list missing on page {}, reloading", self.page.page_index);
            self.session.reload().await?;
            self.page_retry.pause(attempt).await;
        }

        Err(Error::navigation_timeout(format!(
            "Job list {} not found on page {} after {} attempts",
            job_list, self.page.page_index, self.page_retry.max_attempts
        )))
    }

    /// Load page `page_index` and return the cards not seen before
    ///
    /// Every returned identifier has been added to the seen set, so
    /// harvesting the same page twice yields nothing the second time.
    #[instrument(skip(self))]
    pub async fn discover_page(&mut self, page_index: u32) -> Result<Vec<CardRef>> {
        let offset = u64::from(page_index) * u64::from(self.harvest.page_size);
        let params = [
            (self.harvest.offset_param.clone(), offset.to_string()),
            (self.harvest.keywords_param.clone(), self.harvest.keywords.clone()),
        ];
        let updates: Vec<(&str, String)> = params.iter().map(|(k, v)| (k.as_str(), v.clone())).collect();

        let url = self.session.rewrite_query_and_navigate(&updates).await?;
        self.page.advance(page_index, &params);
        debug!("Page {} at {}", page_index, url);

        let list = self.locate_job_list().await?;
        let footer = self.site.pagination_footer.descriptor();
        if self.locator.find(&footer, self.timeouts.default_wait()).await?.is_none() {
            let poll = self.timeouts.scroll_poll();
            let found = self.scroller.scroll_until_located(Some(&list), &footer, &poll).await?;
            if found.is_none() {
                warn!("Pagination footer never appeared on page {}", page_index);
            }
        }

        self.scroller.scroll(ScrollDirection::Top, 0, None).await?;
        let list = self.locate_job_list().await?;
        let html = self.session.inner_html(&list).await?;

        let cards = extract_cards(&html, &self.site.card_class, &self.site.id_attribute);
        let total = cards.len();
        let fresh: Vec<CardRef> = cards
            .into_iter()
            .filter(|card| self.page.admit(&card.identifier))
            .collect();

        info!(
            "Page {}: {} cards, {} new, {} seen in total",
            page_index,
            total,
            fresh.len(),
            self.page.seen_identifiers().len()
        );
        Ok(fresh)
    }

    fn card_fallback(&self, card: &CardRef) -> LocatorDescriptor {
        LocatorDescriptor::css(format!(
            "li[{}=\"{}\"]",
            self.site.id_attribute, card.identifier
        ))
    }

    /// Open a card's detail panel, expand truncated text and capture its markup
    ///
    /// `None` means the card or its detail panel could not be found.
    #[instrument(skip(self, card), fields(identifier = %card.identifier))]
    pub async fn extract_detail(&mut self, card: &CardRef) -> Result<Option<String>> {
        let fallback = self.card_fallback(card);
        let card_locator = match &card.dom_id {
            Some(id) => LocatorDescriptor::id(id.clone()),
            None => fallback.clone(),
        };

        let Some(handle) = self.locator.find(&card_locator, self.timeouts.default_wait()).await? else {
            warn!("Card {} not found", card.identifier);
            return Ok(None);
        };
        self.locator.click(Some(&handle), Some(&fallback)).await?;

        let detail = self.site.detail_panel.descriptor();
        let Some(mut panel) = self.locator.find(&detail, self.timeouts.default_wait()).await? else {
            warn!("Detail panel missing for {}", card.identifier);
            return Ok(None);
        };

        let section_locator = self.site.company_section.descriptor();
        let mut section = None;
        for attempt in 1..=self.timeouts.company_section_attempts {
            if let Some(found) = self.session.find_element(&section_locator, Some(&panel)).await? {
                section = Some(found);
                break;
            }

            debug!("Company section not rendered yet (attempt {})", attempt);
            self.scroller
                .scroll(ScrollDirection::Down, self.timeouts.scroll_step, None)
                .await?;
            Self::pause(self.timeouts.action_settle()).await;

            match self.locator.find(&detail, self.timeouts.default_wait()).await? {
                Some(fresh) => panel = fresh,
                None => return Ok(None),
            }
        }

        match &section {
            Some(section) => {
                let expanded = self.expand_section(section).await;
                debug!("Expanded {} truncated blocks", expanded);
            }
            None => debug!("No company section for {}", card.identifier),
        }

        Self::pause(self.timeouts.detail_settle()).await;

        let Some(panel) = self.locator.find(&detail, self.timeouts.default_wait()).await? else {
            return Ok(None);
        };
        Ok(Some(self.session.inner_html(&panel).await?))
    }

    async fn is_expand_control(&self, button: &ElementHandle) -> bool {
        let class = match self.session.attribute(button, "class").await {
            Ok(Some(class)) => class,
            _ => return false,
        };
        if !class.contains(&self.site.expand_class) {
            return false;
        }

        let text = match self.session.text(button).await {
            Ok(text) => normalize_label(&text),
            Err(_) => return false,
        };
        self.site
            .expand_labels
            .iter()
            .any(|label| normalize_label(label) == text)
    }

    /// Click every "show more" control inside `section`
    ///
    /// A failing control is logged and skipped. Returns how many were clicked.
    async fn expand_section(&mut self, section: &ElementHandle) -> usize {
        let buttons = match self
            .session
            .find_elements(&LocatorDescriptor::new(LocatorStrategy::TagName, "button"), Some(section))
            .await
        {
            Ok(buttons) => buttons,
            Err(e) => {
                warn!("Cannot list expand controls: {}", e);
                return 0;
            }
        };

        let mut expanded = 0;
        for button in buttons {
            if !self.is_expand_control(&button).await {
                continue;
            }

            if let Err(e) = self.scroller.scroll_into_view(&button).await {
                warn!("Cannot scroll expand control into view: {}", e);
                continue;
            }
            Self::pause(self.timeouts.expand_settle()).await;

            match self.locator.click(Some(&button), None).await {
                Ok(_) => expanded += 1,
                Err(e) => warn!("Expand click failed: {}", e),
            }
        }
        expanded
    }
}

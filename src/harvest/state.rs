//! Harvest state machine types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Where a harvest run currently is
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "at", rename_all = "snake_case")]
pub enum HarvestState {
    #[default]
    Idle,
    Navigating,
    AwaitingLogin,
    LoggedIn,
    /// Discovering identifiers on page `n`
    HarvestingPage(u32),
    /// Opening the detail panel of one record
    DetailExtracting(String),
    /// Handing one record to the sink
    Exporting(String),
    Done,
    Failed,
}

impl HarvestState {
    /// `Done` and `Failed` end a run
    pub fn is_terminal(&self) -> bool {
        matches!(self, HarvestState::Done | HarvestState::Failed)
    }

    /// Whether the run may move from `self` to `next`
    pub fn can_transition_to(&self, next: &HarvestState) -> bool {
        use HarvestState::*;

        if self.is_terminal() {
            return false;
        }

        match (self, next) {
            (_, Failed) | (_, Done) => true,
            (Idle, Navigating) => true,
            (Navigating, AwaitingLogin) | (Navigating, LoggedIn) => true,
            (AwaitingLogin, LoggedIn) => true,
            (LoggedIn, HarvestingPage(_)) => true,
            (HarvestingPage(_), HarvestingPage(_)) | (HarvestingPage(_), DetailExtracting(_)) => true,
            (DetailExtracting(a), Exporting(b)) => a == b,
            (DetailExtracting(_), DetailExtracting(_)) | (DetailExtracting(_), HarvestingPage(_)) => true,
            (Exporting(_), DetailExtracting(_)) | (Exporting(_), HarvestingPage(_)) => true,
            _ => false,
        }
    }
}

impl fmt::Display for HarvestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HarvestState::Idle => write!(f, "Idle"),
            HarvestState::Navigating => write!(f, "Navigating"),
            HarvestState::AwaitingLogin => write!(f, "AwaitingLogin"),
            HarvestState::LoggedIn => write!(f, "LoggedIn"),
            HarvestState::HarvestingPage(n) => write!(f, "HarvestingPage({})", n),
            HarvestState::DetailExtracting(id) => write!(f, "DetailExtracting({})", id),
            HarvestState::Exporting(id) => write!(f, "Exporting({})", id),
            HarvestState::Done => write!(f, "Done"),
            HarvestState::Failed => write!(f, "Failed"),
        }
    }
}

/// Position of the run within the result pages
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageState {
    pub page_index: u32,
    pub query_params: BTreeMap<String, String>,
    seen_identifiers: BTreeSet<String>,
}

impl PageState {
    /// Start at `page_index` with identifiers already harvested
    pub fn new(page_index: u32, seen_identifiers: BTreeSet<String>) -> Self {
        Self {
            page_index,
            query_params: BTreeMap::new(),
            seen_identifiers,
        }
    }

    /// Move to another page; the seen set carries over
    pub fn advance<K: AsRef<str>>(&mut self, page_index: u32, params: &[(K, String)]) {
        self.page_index = page_index;
        for (key, value) in params {
            self.query_params.insert(key.as_ref().to_string(), value.clone());
        }
    }

    /// Record `identifier` as seen; `false` if it already was
    pub fn admit(&mut self, identifier: &str) -> bool {
        self.seen_identifiers.insert(identifier.to_string())
    }

    pub fn has_seen(&self, identifier: &str) -> bool {
        self.seen_identifiers.contains(identifier)
    }

    pub fn seen_identifiers(&self) -> &BTreeSet<String> {
        &self.seen_identifiers
    }
}

/// One harvested record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Unique within a harvest run
    pub identifier: String,
    /// Detail-panel markup
    pub raw_html: String,
    pub discovered_at_page: u32,
    pub captured_at: DateTime<Utc>,
}

impl Record {
    pub fn new<I: Into<String>, H: Into<String>>(identifier: I, raw_html: H, discovered_at_page: u32) -> Self {
        Self {
            identifier: identifier.into(),
            raw_html: raw_html.into(),
            discovered_at_page,
            captured_at: Utc::now(),
        }
    }
}

//! Harvest run summary
//!
//! Written on every terminal transition so a failed or cancelled run can be
//! resumed from its last page. Only identifiers that reached the sink count
//! as harvested; anything discovered but not emitted is picked up again.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

use super::state::HarvestState;
use crate::Result;

/// Outcome of one harvest run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarvestSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub state: HarvestState,
    /// Page being harvested when the run ended
    pub last_page_index: u32,
    pub pages_completed: u32,
    pub records_harvested: usize,
    pub seen_identifiers: BTreeSet<String>,
    /// Identifiers emitted to the sink
    #[serde(default)]
    pub harvested_identifiers: BTreeSet<String>,
    /// Identifiers whose detail extraction failed
    pub failed_identifiers: Vec<String>,
    pub cancelled: bool,
    pub error: Option<String>,
}

impl HarvestSummary {
    pub fn new(start_page: u32) -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            state: HarvestState::Idle,
            last_page_index: start_page,
            pages_completed: 0,
            records_harvested: 0,
            seen_identifiers: BTreeSet::new(),
            harvested_identifiers: BTreeSet::new(),
            failed_identifiers: Vec::new(),
            cancelled: false,
            error: None,
        }
    }

    /// Whether the run finished without error
    pub fn is_success(&self) -> bool {
        self.state == HarvestState::Done && self.error.is_none()
    }

    /// Identifiers a resumed run should treat as already harvested
    ///
    /// Failed identifiers and identifiers discovered but never emitted
    /// (cancellation or a fatal error mid-page) are left out.
    pub fn resumable_identifiers(&self) -> BTreeSet<String> {
        self.harvested_identifiers.clone()
    }

    /// Identifiers discovered but neither emitted nor failed
    pub fn pending_identifiers(&self) -> BTreeSet<String> {
        self.seen_identifiers
            .iter()
            .filter(|id| !self.harvested_identifiers.contains(*id) && !self.failed_identifiers.contains(id))
            .cloned()
            .collect()
    }

    /// Write the summary as pretty JSON, creating parent directories
    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        tokio::fs::write(path, json).await?;
        Ok(())
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&content)?)
    }
}

impl fmt::Display for HarvestSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} records from {} pages (last page {}, {} seen, {} failed)",
            self.state,
            self.records_harvested,
            self.pages_completed,
            self.last_page_index,
            self.seen_identifiers.len(),
            self.failed_identifiers.len()
        )?;
        if self.cancelled {
            write!(f, ", cancelled")?;
        }
        if let Some(error) = &self.error {
            write!(f, ", error: {}", error)?;
        }
        Ok(())
    }
}

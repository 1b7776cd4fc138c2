//! Configuration management for Harvest-Oxide
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! `HARVEST_`-prefixed environment variables (`__` separates nested keys,
//! e.g. `HARVEST_HARVEST__PAGE_COUNT=2`).

use crate::element::ScrollPoll;
use crate::locator::LocatorDescriptor;
use crate::webdriver::LocatorStrategy;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable holding the login email
pub const EMAIL_ENV: &str = "HARVEST_EMAIL";

/// Environment variable holding the login password
pub const PASSWORD_ENV: &str = "HARVEST_PASSWORD";

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub browser: BrowserConfig,
    pub site: SiteConfig,
    pub harvest: HarvestConfig,
    pub timeouts: TimeoutConfig,

    /// Log level used when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            browser: BrowserConfig::default(),
            site: SiteConfig::default(),
            harvest: HarvestConfig::default(),
            timeouts: TimeoutConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

/// Browser and driver options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Operator-specified chromedriver binary
    pub driver_path: Option<PathBuf>,

    /// Attach to an already running WebDriver endpoint instead of spawning a driver
    pub webdriver_url: Option<String>,

    /// Port for a spawned driver (0 picks a free port)
    pub driver_port: u16,

    /// How long a spawned driver may take to report ready
    pub driver_startup_timeout_ms: u64,

    /// Where downloaded drivers are cached
    pub cache_dir: Option<PathBuf>,

    /// Allow downloading a driver when none is found locally
    pub allow_download: bool,

    /// Chrome binary location
    pub chrome_binary: Option<PathBuf>,

    pub headless: bool,
    pub no_sandbox: bool,
    pub window_width: u32,
    pub window_height: u32,

    /// Extra Chrome command-line switches
    pub extra_args: Vec<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            driver_path: None,
            webdriver_url: None,
            driver_port: 0,
            driver_startup_timeout_ms: 20000,
            cache_dir: None,
            allow_download: true,
            chrome_binary: None,
            headless: false,
            no_sandbox: true,
            window_width: 1920,
            window_height: 1080,
            extra_args: Vec::new(),
        }
    }
}

/// A locator as written in configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocatorConfig {
    pub strategy: LocatorStrategy,
    pub value: String,
}

impl LocatorConfig {
    pub fn new<S: Into<String>>(strategy: LocatorStrategy, value: S) -> Self {
        Self {
            strategy,
            value: value.into(),
        }
    }

    pub fn css<S: Into<String>>(value: S) -> Self {
        Self::new(LocatorStrategy::CssSelector, value)
    }

    pub fn id<S: Into<String>>(value: S) -> Self {
        Self::new(LocatorStrategy::Id, value)
    }

    /// Descriptor used for lookups
    pub fn descriptor(&self) -> LocatorDescriptor {
        LocatorDescriptor::new(self.strategy, self.value.clone())
    }
}

impl From<&LocatorConfig> for LocatorDescriptor {
    fn from(config: &LocatorConfig) -> Self {
        config.descriptor()
    }
}

/// Target site layout
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Search page every harvest starts from
    pub base_url: String,

    /// Control that opens the sign-in form
    pub login_trigger: LocatorConfig,
    pub email_input: LocatorConfig,
    pub password_input: LocatorConfig,
    pub submit_button: LocatorConfig,

    /// Scrollable job-list container; its presence also confirms login
    pub job_list: LocatorConfig,

    /// Detail panel whose markup becomes the record payload
    pub detail_panel: LocatorConfig,

    /// Pagination footer rendered only after the list is fully populated
    pub pagination_footer: LocatorConfig,

    /// Class token every job card carries
    pub card_class: String,

    /// Card attribute holding the stable record identifier
    pub id_attribute: String,

    /// Sub-section of the detail panel with truncated text
    pub company_section: LocatorConfig,

    /// Class fragment of "show more" buttons
    pub expand_class: String,

    /// Visible labels of "show more" buttons
    pub expand_labels: Vec<String>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.linkedin.com/jobs/search/".to_string(),
            login_trigger: LocatorConfig::css(".modal--contextual-sign-in .sign-in-modal__outlet-btn"),
            email_input: LocatorConfig::id("base-sign-in-modal_session_key"),
            password_input: LocatorConfig::id("base-sign-in-modal_session_password"),
            submit_button: LocatorConfig::css(
                "#base-sign-in-modal > div > section > div > div > form > div.flex.justify-between.sign-in-form__footer--full-width > button",
            ),
            job_list: LocatorConfig::css(
                "#main > div > div.scaffold-layout__list-detail-inner.scaffold-layout__list-detail-inner--grow > div.scaffold-layout__list > div",
            ),
            detail_panel: LocatorConfig::css(
                "#main > div > div.scaffold-layout__list-detail-inner.scaffold-layout__list-detail-inner--grow > div.scaffold-layout__detail.overflow-x-hidden.jobs-search__job-details > div",
            ),
            pagination_footer: LocatorConfig::css(
                "#jobs-search-results-footer > div.jobs-search-pagination.jobs-search-results-list__pagination.p4 > p",
            ),
            card_class: "scaffold-layout__list-item".to_string(),
            id_attribute: "data-occludable-job-id".to_string(),
            company_section: LocatorConfig::css("section.jobs-company"),
            expand_class: "inline-show-more-text__button".to_string(),
            expand_labels: vec![
                "展开".to_string(),
                "show more".to_string(),
                "see more".to_string(),
                "…more".to_string(),
            ],
        }
    }
}

/// Harvest run options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    /// Free-text keyword filter
    pub keywords: String,

    /// Records per result page; the offset of page `n` is `n * page_size`
    pub page_size: u32,

    /// Number of pages to harvest
    pub page_count: u32,

    /// First page index
    pub start_page: u32,

    /// Query parameter carrying the offset
    pub offset_param: String,

    /// Query parameter carrying the keywords
    pub keywords_param: String,

    /// Directory for record files; `test_data/<YYYYMMDD>` when unset
    pub output_dir: Option<PathBuf>,

    /// Saved cookie jar used for login and refreshed afterwards
    pub cookie_file: Option<PathBuf>,

    /// Where the run summary is written
    pub summary_file: Option<PathBuf>,

    /// Summary of an earlier run to resume from
    pub resume_from: Option<PathBuf>,

    /// Stop after a page yields no new identifiers
    pub stop_on_empty_page: bool,

    /// Sign in before harvesting
    pub require_login: bool,

    pub email: Option<String>,
    pub password: Option<String>,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            keywords: "data analyst".to_string(),
            page_size: 25,
            page_count: 4,
            start_page: 0,
            offset_param: "start".to_string(),
            keywords_param: "keywords".to_string(),
            output_dir: None,
            cookie_file: None,
            summary_file: None,
            resume_from: None,
            stop_on_empty_page: false,
            require_login: true,
            email: None,
            password: None,
        }
    }
}

impl HarvestConfig {
    /// Configured output directory or today's default
    pub fn output_dir(&self) -> PathBuf {
        self.output_dir.clone().unwrap_or_else(|| {
            PathBuf::from("test_data").join(chrono::Local::now().format("%Y%m%d").to_string())
        })
    }

    /// Login credentials, when both halves are known
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.email.as_deref(), self.password.as_deref()) {
            (Some(email), Some(password)) if !email.is_empty() && !password.is_empty() => {
                Some((email, password))
            }
            _ => None,
        }
    }
}

/// Waits, settle delays and attempt counts (milliseconds unless noted)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Ordinary element wait
    pub default_wait_ms: u64,

    /// Wait for slow page-level content (login prompt, job list)
    pub long_wait_ms: u64,

    /// Pause between presence checks
    pub poll_interval_ms: u64,

    /// Pause after every navigation
    pub navigation_settle_ms: u64,

    /// Pause after clicks and keystrokes
    pub action_settle_ms: u64,

    /// Pause after scrolling an expand button into view
    pub expand_settle_ms: u64,

    /// Pause before capturing the detail panel
    pub detail_settle_ms: u64,

    /// Pause after reloading the base URL while waiting for the login prompt
    pub login_reload_pause_ms: u64,

    /// Pause after each lazy-load scroll
    pub scroll_poll_ms: u64,

    /// Pixels per lazy-load scroll
    pub scroll_step: i64,

    /// Lazy-load scroll cycles
    pub scroll_attempts: u32,

    /// Login prompt and confirmation attempts
    pub login_attempts: u32,

    /// Attempts to reach the job list after a page navigation
    pub page_load_attempts: u32,

    /// Scroll attempts while looking for the company section
    pub company_section_attempts: u32,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            default_wait_ms: 10000,
            long_wait_ms: 60000,
            poll_interval_ms: 250,
            navigation_settle_ms: 2000,
            action_settle_ms: 500,
            expand_settle_ms: 300,
            detail_settle_ms: 1000,
            login_reload_pause_ms: 10000,
            scroll_poll_ms: 2000,
            scroll_step: 300,
            scroll_attempts: 20,
            login_attempts: 3,
            page_load_attempts: 3,
            company_section_attempts: 5,
        }
    }
}

impl TimeoutConfig {
    /// All waits and settle delays set to zero; handy for mock-driven runs
    pub fn immediate() -> Self {
        Self {
            default_wait_ms: 0,
            long_wait_ms: 0,
            poll_interval_ms: 0,
            navigation_settle_ms: 0,
            action_settle_ms: 0,
            expand_settle_ms: 0,
            detail_settle_ms: 0,
            login_reload_pause_ms: 0,
            scroll_poll_ms: 0,
            ..Self::default()
        }
    }

    pub fn default_wait(&self) -> Duration {
        Duration::from_millis(self.default_wait_ms)
    }

    pub fn long_wait(&self) -> Duration {
        Duration::from_millis(self.long_wait_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn navigation_settle(&self) -> Duration {
        Duration::from_millis(self.navigation_settle_ms)
    }

    pub fn action_settle(&self) -> Duration {
        Duration::from_millis(self.action_settle_ms)
    }

    pub fn expand_settle(&self) -> Duration {
        Duration::from_millis(self.expand_settle_ms)
    }

    pub fn detail_settle(&self) -> Duration {
        Duration::from_millis(self.detail_settle_ms)
    }

    pub fn login_reload_pause(&self) -> Duration {
        Duration::from_millis(self.login_reload_pause_ms)
    }

    /// Scroll-then-poll bounds for lazy loading
    pub fn scroll_poll(&self) -> ScrollPoll {
        ScrollPoll {
            max_attempts: self.scroll_attempts,
            poll_interval: Duration::from_millis(self.scroll_poll_ms),
            step: self.scroll_step,
        }
    }
}

impl Config {
    /// Load configuration: defaults, then `path` (if any), then environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder().add_source(config::Config::try_from(&Config::default())?);

        if let Some(path) = path {
            if !path.exists() {
                return Err(Error::configuration(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            builder = builder.add_source(config::File::from(path));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("HARVEST")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let mut config: Config = builder
            .build()?
            .try_deserialize()
            .map_err(|e| Error::configuration(format!("Failed to parse config: {}", e)))?;

        config.apply_credential_env();
        config.validate()?;
        Ok(config)
    }

    /// Fill missing credentials from `HARVEST_EMAIL` / `HARVEST_PASSWORD`
    pub fn apply_credential_env(&mut self) {
        if self.harvest.email.is_none() {
            self.harvest.email = env::var(EMAIL_ENV).ok();
        }
        if self.harvest.password.is_none() {
            self.harvest.password = env::var(PASSWORD_ENV).ok();
        }
    }

    /// Reject values the harvester cannot work with
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.site.base_url)
            .map_err(|e| Error::configuration(format!("Invalid base_url {}: {}", self.site.base_url, e)))?;

        if self.harvest.page_size == 0 {
            return Err(Error::configuration("page_size must be positive"));
        }
        if self.site.card_class.trim().is_empty() || self.site.id_attribute.trim().is_empty() {
            return Err(Error::configuration("card_class and id_attribute must be set"));
        }
        if self.harvest.offset_param == self.harvest.keywords_param {
            return Err(Error::configuration("offset_param and keywords_param must differ"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.harvest.page_size, 25);
        assert_eq!(config.harvest.page_count, 4);
        assert_eq!(config.harvest.keywords, "data analyst");
        assert_eq!(config.site.id_attribute, "data-occludable-job-id");
        assert_eq!(config.site.company_section.strategy, LocatorStrategy::CssSelector);
        assert_eq!(config.timeouts.scroll_poll().max_attempts, 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
log_level = "debug"

[harvest]
page_count = 2
keywords = "rust engineer"
stop_on_empty_page = true

[site.job_list]
strategy = "xpath"
value = "//ul"

[timeouts]
scroll_attempts = 5
"#
        )
        .unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.harvest.page_count, 2);
        assert_eq!(config.harvest.keywords, "rust engineer");
        assert!(config.harvest.stop_on_empty_page);
        assert_eq!(config.site.job_list.descriptor(), LocatorDescriptor::xpath("//ul"));
        assert_eq!(config.timeouts.scroll_attempts, 5);
        // Untouched sections keep their defaults
        assert_eq!(config.harvest.page_size, 25);
        assert_eq!(config.site.card_class, "scaffold-layout__list-item");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result = Config::load(Some(Path::new("/definitely/not/here.toml")));
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.harvest.page_size = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.site.base_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_credentials_require_both_halves() {
        let mut harvest = HarvestConfig::default();
        assert!(harvest.credentials().is_none());

        harvest.email = Some("a@b.c".to_string());
        assert!(harvest.credentials().is_none());

        harvest.password = Some("secret".to_string());
        assert_eq!(harvest.credentials(), Some(("a@b.c", "secret")));
    }

    #[test]
    fn test_immediate_timeouts() {
        let timeouts = TimeoutConfig::immediate();
        assert!(timeouts.long_wait().is_zero());
        assert!(timeouts.scroll_poll().poll_interval.is_zero());
        assert_eq!(timeouts.login_attempts, 3);
    }
}

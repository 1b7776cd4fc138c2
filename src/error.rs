//! Unified error types for harvest-oxide

use thiserror::Error;

use crate::harvest::summary::HarvestSummary;

/// Unified Result type
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for harvest-oxide
#[derive(Error, Debug)]
pub enum Error {
    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP transport errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parsing errors
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Driver archive errors
    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// No usable browser driver could be resolved
    #[error("Driver initialization failed: {0}")]
    DriverInitialization(String),

    /// Unmapped WebDriver protocol error
    #[error("WebDriver error [{code}]: {message}")]
    WebDriver { code: String, message: String },

    /// Page did not reach its content signal in time
    #[error("Navigation timeout: {0}")]
    NavigationTimeout(String),

    /// Element not found
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    /// Element reference no longer points at a live node
    #[error("Stale element: {0}")]
    StaleElement(String),

    /// Credential submission did not produce the logged-in signal
    #[error("Login failed: {0}")]
    LoginFailure(String),

    /// A single cookie was rejected by the browser
    #[error("Cookie rejected: {0}")]
    CookieRejected(String),

    /// Session already closed or unknown to the driver
    #[error("Session closed: {0}")]
    SessionClosed(String),

    /// Timeout
    #[error("Operation timeout: {0}")]
    Timeout(String),

    /// Script execution failed
    #[error("Script execution failed: {0}")]
    ScriptExecutionFailed(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Harvest run aborted; carries what was collected before the failure
    #[error("{0}")]
    Harvest(Box<HarvestFailure>),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A failed harvest run together with its partial results
#[derive(Debug)]
pub struct HarvestFailure {
    /// Summary at the moment of failure
    pub summary: HarvestSummary,
    /// Condition that ended the run
    pub cause: Error,
}

impl std::fmt::Display for HarvestFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Harvest failed at page {} after {} records: {}",
            self.summary.last_page_index, self.summary.records_harvested, self.cause
        )
    }
}

impl Error {
    /// Create a new driver initialization error
    pub fn driver_initialization<S: Into<String>>(msg: S) -> Self {
        Error::DriverInitialization(msg.into())
    }

    /// Create a new WebDriver protocol error
    pub fn webdriver<C: Into<String>, M: Into<String>>(code: C, message: M) -> Self {
        Error::WebDriver {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Create a new navigation timeout error
    pub fn navigation_timeout<S: Into<String>>(msg: S) -> Self {
        Error::NavigationTimeout(msg.into())
    }

    /// Create a new element not found error
    pub fn element_not_found<S: Into<String>>(msg: S) -> Self {
        Error::ElementNotFound(msg.into())
    }

    /// Create a new stale element error
    pub fn stale<S: Into<String>>(msg: S) -> Self {
        Error::StaleElement(msg.into())
    }

    /// Create a new login failure
    pub fn login_failure<S: Into<String>>(msg: S) -> Self {
        Error::LoginFailure(msg.into())
    }

    /// Create a new cookie rejected error
    pub fn cookie_rejected<S: Into<String>>(msg: S) -> Self {
        Error::CookieRejected(msg.into())
    }

    /// Create a new session closed error
    pub fn session_closed<S: Into<String>>(msg: S) -> Self {
        Error::SessionClosed(msg.into())
    }

    /// Create a new timeout error
    pub fn timeout<S: Into<String>>(msg: S) -> Self {
        Error::Timeout(msg.into())
    }

    /// Create a new script execution failed error
    pub fn script_execution_failed<S: Into<String>>(msg: S) -> Self {
        Error::ScriptExecutionFailed(msg.into())
    }

    /// Create a new configuration error
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        Error::Configuration(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Error::Internal(msg.into())
    }

    /// Wrap a fatal condition together with the run's partial results
    pub fn harvest(summary: HarvestSummary, cause: Error) -> Self {
        Error::Harvest(Box::new(HarvestFailure { summary, cause }))
    }

    /// Whether the condition may clear up on its own and is worth retrying
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Http(_)
                | Error::Timeout(_)
                | Error::NavigationTimeout(_)
                | Error::StaleElement(_)
                | Error::ElementNotFound(_)
        )
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::Configuration(err.to_string())
    }
}

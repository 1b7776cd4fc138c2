//! Harvest-Oxide: resilient WebDriver-driven harvester for paginated job boards
//!
//! This library drives one remote browser session through a JavaScript-heavy,
//! lazily rendered job board and emits the raw detail-panel markup of every
//! listing exactly once.

pub mod error;
pub mod config;
pub mod retry;
pub mod scripts;

pub mod webdriver;
pub mod session;
pub mod locator;
pub mod element;
pub mod harvest;

// Re-exports
pub use error::{Error, Result};

/// Harvest-Oxide library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

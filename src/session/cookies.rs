//! Cookie file persistence
//!
//! The cookie file is a pretty-printed JSON array of cookie records with a
//! fixed key order (`name`, `value`, `domain`, `path`, `expiry`, `secure`,
//! `httpOnly`) so saved jars diff cleanly.

use std::path::Path;
use tracing::debug;

use crate::webdriver::Cookie;
use crate::Result;

/// Write a cookie jar, creating the parent directory if needed
pub fn write_cookie_file(path: &Path, cookies: &[Cookie]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut json = serde_json::to_string_pretty(cookies)?;
    json.push('\n');
    std::fs::write(path, json)?;

    debug!("Wrote {} cookies to {}", cookies.len(), path.display());
    Ok(())
}

/// Read a cookie jar; expiry values are normalized to integer epoch seconds
pub fn read_cookie_file(path: &Path) -> Result<Vec<Cookie>> {
    let content = std::fs::read_to_string(path)?;
    let cookies: Vec<Cookie> = serde_json::from_str(&content)?;

    debug!("Read {} cookies from {}", cookies.len(), path.display());
    Ok(cookies)
}

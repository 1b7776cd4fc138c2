//! Browser driver resolution and process management
//!
//! Resolution order: operator-configured path, well-known system install,
//! locally cached download, network download. The first usable driver wins;
//! when every source fails the reasons are reported together.

use serde::Deserialize;
use serde_json::{json, Value};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::SystemTime;
use tracing::{debug, info, instrument, warn};

use crate::config::BrowserConfig;
use crate::retry::RetryPolicy;
use crate::{Error, Result};

/// Well-known system-wide chromedriver install
pub const SYSTEM_DRIVER_PATH: &str = "/usr/local/bin/chromedriver";

/// Chrome binary used inside containers
pub const CONTAINER_CHROME_BINARY: &str = "/usr/bin/google-chrome";

/// Chrome-for-Testing release manifest
pub const CFT_MANIFEST_URL: &str =
    "https://googlechromelabs.github.io/chrome-for-testing/last-known-good-versions-with-downloads.json";

/// Where a resolved driver came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverSource {
    Configured,
    System,
    Cache,
    Download,
}

/// A usable driver binary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDriver {
    pub path: PathBuf,
    pub source: DriverSource,
}

#[derive(Debug, Deserialize)]
struct CftManifest {
    channels: CftChannels,
}

#[derive(Debug, Deserialize)]
struct CftChannels {
    #[serde(rename = "Stable")]
    stable: Option<CftChannel>,
}

#[derive(Debug, Deserialize)]
struct CftChannel {
    #[serde(default)]
    version: String,
    downloads: CftDownloads,
}

#[derive(Debug, Deserialize)]
struct CftDownloads {
    chromedriver: Option<Vec<CftAsset>>,
}

#[derive(Debug, Deserialize)]
struct CftAsset {
    platform: String,
    url: String,
}

/// Chrome-for-Testing platform key of the host
pub fn chromedriver_platform() -> Option<&'static str> {
    match (std::env::consts::OS, std::env::consts::ARCH) {
        ("linux", "x86_64") => Some("linux64"),
        ("macos", "aarch64") => Some("mac-arm64"),
        ("macos", "x86_64") => Some("mac-x64"),
        ("windows", "x86_64") => Some("win64"),
        ("windows", "x86") => Some("win32"),
        _ => None,
    }
}

/// File name of the driver binary on this host
pub fn chromedriver_file_name() -> &'static str {
    if cfg!(windows) {
        "chromedriver.exe"
    } else {
        "chromedriver"
    }
}

/// Whether we run inside a container
pub fn in_container() -> bool {
    Path::new("/.dockerenv").exists() || std::env::var_os("DOCKER_CONTAINER").is_some()
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(unix)]
fn make_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

/// Use `path` if it is an executable file, granting `755` once if needed
fn usable(path: &Path) -> std::result::Result<PathBuf, String> {
    if !path.is_file() {
        return Err(format!("{} does not exist", path.display()));
    }
    if is_executable(path) {
        return Ok(path.to_path_buf());
    }

    warn!("{} is not executable, trying chmod 755", path.display());
    make_executable(path).map_err(|e| format!("{} is not executable: {}", path.display(), e))?;

    if is_executable(path) {
        Ok(path.to_path_buf())
    } else {
        Err(format!("{} is still not executable", path.display()))
    }
}

/// Newest driver binary below `dir` by modification time
fn newest_driver_in(dir: &Path, depth: usize) -> Option<(SystemTime, PathBuf)> {
    let entries = std::fs::read_dir(dir).ok()?;
    let mut newest: Option<(SystemTime, PathBuf)> = None;

    for entry in entries.flatten() {
        let path = entry.path();
        let candidate = if path.is_dir() {
            if depth == 0 {
                continue;
            }
            newest_driver_in(&path, depth - 1)
        } else if path.file_name().and_then(|n| n.to_str()) == Some(chromedriver_file_name()) {
            entry
                .metadata()
                .and_then(|m| m.modified())
                .ok()
                .map(|modified| (modified, path))
        } else {
            None
        };

        if let Some((modified, path)) = candidate {
            if newest.as_ref().map(|(t, _)| modified > *t).unwrap_or(true) {
                newest = Some((modified, path));
            }
        }
    }

    newest
}

/// Extract the driver binary from a Chrome-for-Testing archive
///
/// Blocking; run it off the async workers.
fn extract_driver(archive: &[u8], target: &Path) -> Result<()> {
    let mut zip = zip::ZipArchive::new(Cursor::new(archive))?;

    for index in 0..zip.len() {
        let mut file = zip.by_index(index)?;
        let matches = Path::new(file.name())
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n == chromedriver_file_name())
            .unwrap_or(false);

        if matches {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut out = std::fs::File::create(target)?;
            std::io::copy(&mut file, &mut out)?;
            make_executable(target)?;
            return Ok(());
        }
    }

    Err(Error::driver_initialization(format!(
        "{} not found in downloaded archive",
        chromedriver_file_name()
    )))
}

/// Finds a usable chromedriver
#[derive(Debug, Clone)]
pub struct DriverResolver {
    configured: Option<PathBuf>,
    system_paths: Vec<PathBuf>,
    search_path: bool,
    cache_dirs: Vec<PathBuf>,
    download_dir: Option<PathBuf>,
    manifest_url: String,
}

impl Default for DriverResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl DriverResolver {
    /// Resolver with no sources; add them with the `with_*` methods
    pub fn new() -> Self {
        Self {
            configured: None,
            system_paths: Vec::new(),
            search_path: false,
            cache_dirs: Vec::new(),
            download_dir: None,
            manifest_url: CFT_MANIFEST_URL.to_string(),
        }
    }

    /// Resolver wired to the standard locations
    pub fn from_config(config: &BrowserConfig) -> Self {
        let download_dir = config
            .cache_dir
            .clone()
            .or_else(|| dirs::cache_dir().map(|d| d.join("harvest-oxide").join("drivers")));

        let mut cache_dirs: Vec<PathBuf> = download_dir.iter().cloned().collect();
        if let Some(home) = dirs::home_dir() {
            cache_dirs.push(home.join(".wdm").join("drivers").join("chromedriver"));
        }

        let mut resolver = Self::new()
            .with_system_paths(vec![PathBuf::from(SYSTEM_DRIVER_PATH)])
            .with_path_lookup(true)
            .with_cache_dirs(cache_dirs);
        resolver.configured = config.driver_path.clone();
        if config.allow_download {
            resolver.download_dir = download_dir;
        }
        resolver
    }

    pub fn with_configured<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.configured = Some(path.into());
        self
    }

    pub fn with_system_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.system_paths = paths;
        self
    }

    /// Also look for `chromedriver` on `PATH`
    pub fn with_path_lookup(mut self, enabled: bool) -> Self {
        self.search_path = enabled;
        self
    }

    pub fn with_cache_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.cache_dirs = dirs;
        self
    }

    /// Enable downloads into `dir` from the given manifest
    pub fn with_download<P: Into<PathBuf>, S: Into<String>>(mut self, dir: P, manifest_url: S) -> Self {
        self.download_dir = Some(dir.into());
        self.manifest_url = manifest_url.into();
        self
    }

    /// First usable driver, or every reason each source failed
    #[instrument(skip(self))]
    pub async fn resolve(&self) -> Result<ResolvedDriver> {
        let mut reasons = Vec::new();

        match &self.configured {
            Some(path) => match usable(path) {
                Ok(path) => return Ok(self.found(path, DriverSource::Configured)),
                Err(reason) => reasons.push(format!("configured: {}", reason)),
            },
            None => reasons.push("configured: no driver path set".to_string()),
        }

        match self.try_system() {
            Ok(path) => return Ok(self.found(path, DriverSource::System)),
            Err(reason) => reasons.push(format!("system: {}", reason)),
        }

        match self.try_cache() {
            Ok(path) => return Ok(self.found(path, DriverSource::Cache)),
            Err(reason) => reasons.push(format!("cache: {}", reason)),
        }

        match self.try_download().await {
            Ok(path) => return Ok(self.found(path, DriverSource::Download)),
            Err(reason) => reasons.push(format!("download: {}", reason)),
        }

        Err(Error::driver_initialization(reasons.join("; ")))
    }

    fn found(&self, path: PathBuf, source: DriverSource) -> ResolvedDriver {
        info!("Using chromedriver {} ({:?})", path.display(), source);
        ResolvedDriver { path, source }
    }

    fn try_system(&self) -> std::result::Result<PathBuf, String> {
        let mut reasons = Vec::new();

        for path in &self.system_paths {
            match usable(path) {
                Ok(path) => return Ok(path),
                Err(reason) => reasons.push(reason),
            }
        }

        if self.search_path {
            match which::which(chromedriver_file_name()) {
                Ok(path) => return usable(&path),
                Err(e) => reasons.push(format!("not on PATH ({})", e)),
            }
        }

        if reasons.is_empty() {
            reasons.push("no system locations".to_string());
        }
        Err(reasons.join(", "))
    }

    fn try_cache(&self) -> std::result::Result<PathBuf, String> {
        let newest = self
            .cache_dirs
            .iter()
            .filter_map(|dir| newest_driver_in(dir, 6))
            .max_by_key(|(modified, _)| *modified);

        match newest {
            Some((_, path)) => usable(&path),
            None => Err("no cached driver".to_string()),
        }
    }

    async fn try_download(&self) -> std::result::Result<PathBuf, String> {
        let Some(dir) = &self.download_dir else {
            return Err("downloads disabled".to_string());
        };
        let platform = chromedriver_platform().ok_or_else(|| "unsupported platform".to_string())?;

        self.download(dir, platform).await.map_err(|e| e.to_string())
    }

    async fn download(&self, dir: &Path, platform: &str) -> Result<PathBuf> {
        info!("Downloading chromedriver for {} from {}", platform, self.manifest_url);

        let manifest: CftManifest = reqwest::get(&self.manifest_url)
            .await?
            .error_for_status()?
            .json()
            .await?;

        let stable = manifest
            .channels
            .stable
            .ok_or_else(|| Error::driver_initialization("manifest has no Stable channel"))?;
        let asset = stable
            .downloads
            .chromedriver
            .unwrap_or_default()
            .into_iter()
            .find(|a| a.platform == platform)
            .ok_or_else(|| Error::driver_initialization(format!("no chromedriver asset for {}", platform)))?;

        debug!("Fetching chromedriver {} from {}", stable.version, asset.url);
        let archive = reqwest::get(&asset.url).await?.error_for_status()?.bytes().await?;

        let target = dir.join(platform).join(chromedriver_file_name());
        let destination = target.clone();
        tokio::task::spawn_blocking(move || extract_driver(&archive, &destination))
            .await
            .map_err(|e| Error::internal(format!("Driver extraction task failed: {}", e)))??;
        Ok(target)
    }
}

/// `goog:chromeOptions` capabilities for a new session
pub fn chrome_capabilities(config: &BrowserConfig) -> Value {
    let mut args: Vec<String> = Vec::new();
    if config.headless {
        args.push("--headless=new".to_string());
    }
    if config.no_sandbox {
        args.push("--no-sandbox".to_string());
    }
    args.push("--disable-dev-shm-usage".to_string());
    args.push("--disable-gpu".to_string());
    args.push(format!("--window-size={},{}", config.window_width, config.window_height));
    args.extend(config.extra_args.iter().cloned());

    let mut options = json!({ "args": args });

    let binary = config.chrome_binary.clone().or_else(|| {
        if in_container() {
            Some(PathBuf::from(CONTAINER_CHROME_BINARY))
        } else {
            None
        }
    });
    if let Some(binary) = binary {
        options["binary"] = json!(binary.to_string_lossy());
    }

    json!({
        "browserName": "chrome",
        "goog:chromeOptions": options,
    })
}

/// A running chromedriver
#[derive(Debug)]
pub struct DriverProcess {
    child: tokio::process::Child,
    port: u16,
}

impl DriverProcess {
    /// Spawn the driver and wait until `/status` reports ready
    ///
    /// A `port` of 0 picks a free local port.
    #[instrument(skip(readiness))]
    pub async fn spawn(driver: &Path, port: u16, readiness: &RetryPolicy) -> Result<Self> {
        let port = if port == 0 { free_port()? } else { port };

        let child = tokio::process::Command::new(driver)
            .arg(format!("--port={}", port))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::driver_initialization(format!("Failed to start {}: {}", driver.display(), e)))?;

        let mut process = Self { child, port };
        let status_url = format!("{}/status", process.endpoint());

        let ready = readiness
            .retry("chromedriver status", |_| {
                let url = status_url.clone();
                async move {
                    let body: Value = reqwest::get(&url).await?.json().await?;
                    if body["value"]["ready"].as_bool().unwrap_or(false) {
                        Ok(())
                    } else {
                        Err(Error::timeout("chromedriver not ready"))
                    }
                }
            })
            .await;

        if let Err(e) = ready {
            process.kill().await;
            return Err(Error::driver_initialization(format!("chromedriver did not become ready: {}", e)));
        }

        info!("chromedriver listening on port {}", process.port);
        Ok(process)
    }

    /// HTTP endpoint of the driver
    pub fn endpoint(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// Stop the driver
    pub async fn kill(&mut self) {
        if let Err(e) = self.child.kill().await {
            debug!("chromedriver already exited: {}", e);
        }
    }
}

fn free_port() -> Result<u16> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

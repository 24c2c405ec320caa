//! Configuration management with serde serialization/deserialization
//!
//! The capture configuration is built once at startup (JSON file, then CLI
//! overrides) and shared read-only by every worker for the rest of the run.

use crate::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Capture configuration shared by all workers
///
/// # Examples
///
/// ```rust
/// use urlshot::Config;
/// use std::time::Duration;
///
/// let config = Config {
///     output_dir: "shots".into(),
///     proxy: Some("http://127.0.0.1:8080".to_string()),
///     timeout: Some(Duration::from_secs(10)),
///     ..Default::default()
/// };
/// assert_eq!(config.threads, 4);
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Directory the screenshots are written to (default: current directory)
    pub output_dir: PathBuf,

    /// Proxy server handed to the browser unmodified, e.g. `http://127.0.0.1:8080`
    pub proxy: Option<String>,

    /// Per-capture deadline (default: none)
    ///
    /// `None` lets a capture run for as long as the page takes to load.
    /// Serialized as whole seconds, where `0` means no deadline.
    #[serde(with = "timeout_secs")]
    pub timeout: Option<Duration>,

    /// Extra HTTP headers sent with every request of a capture session
    pub headers: BTreeMap<String, String>,

    /// Number of concurrent capture workers (default: 4)
    pub threads: usize,

    /// Browser viewport used for every capture
    pub viewport: Viewport,

    /// Path to Chrome/Chromium executable (default: auto-detect)
    pub chrome_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            proxy: None,
            timeout: None,
            headers: BTreeMap::new(),
            threads: 4,
            viewport: Viewport::default(),
            chrome_path: None,
        }
    }
}

impl Config {
    /// Parse a JSON configuration document. Missing fields take their defaults.
    pub fn from_json(path: &Path, content: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(content).map_err(|e| ConfigError::ConfigFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.viewport.width == 0 || self.viewport.height == 0 {
            return Err(ConfigError::Invalid(
                "Viewport dimensions must be greater than 0".to_string(),
            ));
        }

        if matches!(&self.proxy, Some(proxy) if proxy.trim().is_empty()) {
            return Err(ConfigError::Invalid("Proxy address is empty".to_string()));
        }

        Ok(())
    }

    /// Proxy address to hand to a render session, if one is configured.
    pub fn proxy(&self) -> Option<&str> {
        self.proxy.as_deref().filter(|p| !p.is_empty())
    }
}

/// Convert the `-t` flag into a deadline. Zero or negative means no deadline.
pub fn timeout_from_secs(secs: i64) -> Option<Duration> {
    u64::try_from(secs)
        .ok()
        .filter(|&s| s > 0)
        .map(Duration::from_secs)
}

/// Browser viewport configuration for screenshots
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Viewport {
    /// Viewport width in pixels (default: 1920)
    pub width: u32,

    /// Viewport height in pixels (default: 1080)
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
        }
    }
}

mod timeout_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(value.map(|d| d.as_secs()).unwrap_or(0))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        let secs = i64::deserialize(d)?;
        Ok(super::timeout_from_secs(secs))
    }
}

/// Generate Chrome command-line arguments for one capture session
///
/// The proxy (if any) is fixed at launch, before any navigation happens.
///
/// # Examples
///
/// ```rust
/// use urlshot::{get_chrome_args, Viewport};
///
/// let args = get_chrome_args(&Viewport::default(), Some("socks5://127.0.0.1:9050"));
/// assert!(args.contains(&"--proxy-server=socks5://127.0.0.1:9050".to_string()));
/// ```
pub fn get_chrome_args(viewport: &Viewport, proxy: Option<&str>) -> Vec<String> {
    let mut args = vec![
        "--headless".to_string(),
        "--no-sandbox".to_string(),
        "--disable-dev-shm-usage".to_string(),
        "--disable-gpu".to_string(),
        "--disable-extensions".to_string(),
        "--disable-default-apps".to_string(),
        "--disable-sync".to_string(),
        "--no-first-run".to_string(),
        "--hide-scrollbars".to_string(),
        "--mute-audio".to_string(),
        format!("--window-size={},{}", viewport.width, viewport.height),
    ];

    if let Some(proxy) = proxy {
        args.push(format!("--proxy-server={proxy}"));
    }

    args
}

/// Build the launch configuration for one capture session
///
/// Every session gets its own user data directory so that concurrent
/// browsers never share a profile.
pub fn create_browser_config(
    viewport: &Viewport,
    chrome_path: Option<&str>,
    proxy: Option<&str>,
    user_data_dir: &Path,
) -> Result<chromiumoxide::browser::BrowserConfig, crate::RenderError> {
    use chromiumoxide::browser::BrowserConfig;
    use chromiumoxide::handler::viewport::Viewport as ChromeViewport;

    let mut builder = BrowserConfig::builder()
        .window_size(viewport.width, viewport.height)
        .viewport(ChromeViewport {
            width: viewport.width,
            height: viewport.height,
            ..Default::default()
        })
        .user_data_dir(user_data_dir)
        .args(get_chrome_args(viewport, proxy));

    if let Some(chrome_path) = chrome_path {
        builder = builder.chrome_executable(chrome_path);
    }

    builder.build().map_err(crate::RenderError::Launch)
}

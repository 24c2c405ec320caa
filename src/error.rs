use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Fatal errors raised before any capture work begins.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("You must specify either -u or -f")]
    MissingInput,

    #[error("Failed to create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Output directory is not writable: {path}: {source}")]
    OutputDirNotWritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read URL file {path}: {source}")]
    ReadUrls {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration file {path}: {reason}")]
    ConfigFile { path: PathBuf, reason: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Failures reported by a render session.
#[derive(Debug, Clone, Error)]
pub enum RenderError {
    #[error("Browser launch failed: {0}")]
    Launch(String),

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Screenshot capture failed: {0}")]
    Screenshot(String),

    #[error("Chrome error: {0}")]
    Protocol(String),
}

/// Outcome of a single failed capture. Contained to the task that produced it.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("timeout: page load exceeded {timeout:?} for {url}")]
    Timeout { url: String, timeout: Duration },

    #[error("failed to capture screenshot for {url}: {reason}")]
    CaptureFailure { url: String, reason: RenderError },

    #[error("failed to save screenshot for {url} to {path}: {source}")]
    PersistFailure {
        url: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CaptureError {
    /// Stable kind name used for log fields and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            CaptureError::Timeout { .. } => "timeout",
            CaptureError::CaptureFailure { .. } => "capture_failure",
            CaptureError::PersistFailure { .. } => "persist_failure",
        }
    }

    pub fn url(&self) -> &str {
        match self {
            CaptureError::Timeout { url, .. }
            | CaptureError::CaptureFailure { url, .. }
            | CaptureError::PersistFailure { url, .. } => url,
        }
    }
}

impl From<chromiumoxide::error::CdpError> for RenderError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        RenderError::Protocol(err.to_string())
    }
}

impl From<serde_json::Error> for RenderError {
    fn from(err: serde_json::Error) -> Self {
        RenderError::Protocol(err.to_string())
    }
}

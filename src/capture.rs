//! Single-URL capture under a deadline
//!
//! [`CaptureInvoker`] performs one capture attempt: open an isolated render
//! session, apply headers, navigate, take the screenshot, close the session,
//! and persist the PNG. Every failure is classified into a [`CaptureError`]
//! and returned as a value so that the calling worker can move on.

use crate::{
    format_bytes, format_duration, output_file_name, telemetry, CaptureError, Config,
    RenderError, RenderSession, Renderer,
};
use chrono::{Local, NaiveDateTime};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::time::timeout;
use tracing::{error, info, warn};

/// Upper bound on tearing down a session once the capture is over.
const CLOSE_GRACE: Duration = Duration::from_secs(10);

/// Runs capture attempts against a shared, read-only configuration
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use urlshot::{CaptureInvoker, ChromeRenderer, Config};
///
/// #[tokio::main]
/// async fn main() {
///     let config = Arc::new(Config::default());
///     let renderer = Arc::new(ChromeRenderer::new(&config));
///     let invoker = CaptureInvoker::new(renderer, config);
///
///     match invoker.capture("https://example.com").await {
///         Ok(path) => println!("saved {}", path.display()),
///         Err(e) => eprintln!("{e}"),
///     }
/// }
/// ```
pub struct CaptureInvoker {
    renderer: Arc<dyn Renderer>,
    config: Arc<Config>,
}

impl CaptureInvoker {
    pub fn new(renderer: Arc<dyn Renderer>, config: Arc<Config>) -> Self {
        Self { renderer, config }
    }

    /// Capture `url` and write it to the output directory.
    ///
    /// Logs one line when the attempt starts and one with its outcome.
    pub async fn capture(&self, url: &str) -> Result<PathBuf, CaptureError> {
        let start_time = Instant::now();
        info!("Capturing {}", url);

        let result = self.capture_inner(url).await;
        let elapsed = start_time.elapsed();
        telemetry::record_capture(result.as_ref().map(|_| ()), elapsed);

        match &result {
            Ok(path) => info!(
                "Screenshot saved: {} [{}]",
                path.display(),
                format_duration(elapsed)
            ),
            Err(e @ CaptureError::PersistFailure { .. }) => error!("{}", e),
            Err(e) => warn!("{}", e),
        }

        result
    }

    async fn capture_inner(&self, url: &str) -> Result<PathBuf, CaptureError> {
        let data = self.render(url).await?;
        self.persist(url, &data, Local::now().naive_local()).await
    }

    /// Steps up to and including the screenshot run under the deadline.
    /// The session is closed on every path, including an expired deadline.
    async fn render(&self, url: &str) -> Result<Vec<u8>, CaptureError> {
        let mut slot: Option<Box<dyn RenderSession>> = None;
        let attempt = self.drive(&mut slot, url);

        let outcome = match self.config.timeout {
            Some(limit) => match timeout(limit, attempt).await {
                Ok(result) => result,
                Err(_) => Err(CaptureError::Timeout {
                    url: url.to_string(),
                    timeout: limit,
                }),
            },
            None => attempt.await,
        };

        if let Some(mut session) = slot.take() {
            if timeout(CLOSE_GRACE, session.close()).await.is_err() {
                warn!("Render session for {} did not close within {:?}", url, CLOSE_GRACE);
            }
        }

        outcome
    }

    async fn drive(
        &self,
        slot: &mut Option<Box<dyn RenderSession>>,
        url: &str,
    ) -> Result<Vec<u8>, CaptureError> {
        let failure = |reason: RenderError| CaptureError::CaptureFailure {
            url: url.to_string(),
            reason,
        };

        let session = self
            .renderer
            .open_session(self.config.proxy())
            .await
            .map_err(failure)?;
        let session = slot.insert(session);

        if !self.config.headers.is_empty() {
            session
                .set_headers(&self.config.headers)
                .await
                .map_err(failure)?;
        }

        session.navigate(url).await.map_err(failure)?;
        session.screenshot().await.map_err(failure)
    }

    /// Write `data` as the capture of `url` taken at `taken_at`.
    ///
    /// An existing file with the same name is overwritten.
    pub async fn persist(
        &self,
        url: &str,
        data: &[u8],
        taken_at: NaiveDateTime,
    ) -> Result<PathBuf, CaptureError> {
        let path = self.config.output_dir.join(output_file_name(url, taken_at));

        match write_screenshot(&path, data).await {
            Ok(()) => {
                tracing::debug!("Wrote {} to {}", format_bytes(data.len()), path.display());
                Ok(path)
            }
            Err(source) => Err(CaptureError::PersistFailure {
                url: url.to_string(),
                path,
                source,
            }),
        }
    }
}

async fn write_screenshot(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o644);

    let mut file = options.open(path).await?;
    if let Err(e) = file.write_all(data).await {
        drop(file);
        let _ = tokio::fs::remove_file(path).await;
        return Err(e);
    }
    file.flush().await
}

//! Rendering capability used by the capture pipeline
//!
//! A [`Renderer`] hands out one [`RenderSession`] per capture. Sessions are
//! never reused: each one is an isolated browser with its own profile, proxy
//! and extra headers, and is closed before the worker claims its next URL.
//! [`ChromeRenderer`] implements this on top of a headless Chromium launched
//! through `chromiumoxide`.

use crate::{create_browser_config, Config, RenderError, Viewport};
use async_trait::async_trait;
use chromiumoxide::browser::Browser;
use chromiumoxide::cdp::browser_protocol::network::{EnableParams, Headers, SetExtraHttpHeadersParams};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::error::CdpError;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::debug;

/// Interval between checks for the document root element after navigation.
const ROOT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Selector that marks a page as ready for capture.
const ROOT_SELECTOR: &str = "body";

/// Source of isolated render sessions.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Start a fresh session. The proxy applies to every request the session makes.
    async fn open_session(&self, proxy: Option<&str>) -> Result<Box<dyn RenderSession>, RenderError>;
}

/// One isolated browsing context, owned by a single worker for a single URL.
///
/// Every operation may be abandoned by dropping its future; implementations
/// must release their resources on drop as well as on [`close`](Self::close).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RenderSession: Send {
    /// Send `headers` with every subsequent request of this session.
    async fn set_headers(&mut self, headers: &BTreeMap<String, String>) -> Result<(), RenderError>;

    /// Navigate to `url` and return once the document root element is present.
    async fn navigate(&mut self, url: &str) -> Result<(), RenderError>;

    /// Capture the current viewport as PNG bytes.
    async fn screenshot(&mut self) -> Result<Vec<u8>, RenderError>;

    async fn close(&mut self);
}

/// Launches one headless Chromium per session.
pub struct ChromeRenderer {
    viewport: Viewport,
    chrome_path: Option<String>,
    profile_root: PathBuf,
    next_session_id: AtomicUsize,
}

impl ChromeRenderer {
    pub fn new(config: &Config) -> Self {
        Self {
            viewport: config.viewport.clone(),
            chrome_path: config.chrome_path.clone(),
            profile_root: std::env::temp_dir(),
            next_session_id: AtomicUsize::new(0),
        }
    }

    fn profile_dir(&self, session_id: usize) -> PathBuf {
        self.profile_root
            .join(format!("urlshot-{}-{}", std::process::id(), session_id))
    }
}

#[async_trait]
impl Renderer for ChromeRenderer {
    async fn open_session(&self, proxy: Option<&str>) -> Result<Box<dyn RenderSession>, RenderError> {
        let id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        let profile = ProfileDir::create(self.profile_dir(id)).await?;

        let browser_config = create_browser_config(
            &self.viewport,
            self.chrome_path.as_deref(),
            proxy,
            profile.path(),
        )?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| RenderError::Launch(e.to_string()))?;

        // The handler drives the DevTools connection and must be polled for
        // as long as the browser is in use.
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Session {} handler error: {}", id, e);
                }
            }
            debug!("Session {} handler stream ended", id);
        });

        let mut session = ChromeSession {
            id,
            browser,
            handler,
            page: None,
            profile,
            closed: false,
        };

        match session.browser.new_page("about:blank").await {
            Ok(page) => session.page = Some(page),
            Err(e) => {
                session.close().await;
                return Err(RenderError::Launch(e.to_string()));
            }
        }

        debug!("Opened render session {}", id);
        Ok(Box::new(session))
    }
}

pub struct ChromeSession {
    id: usize,
    browser: Browser,
    handler: JoinHandle<()>,
    page: Option<Page>,
    profile: ProfileDir,
    closed: bool,
}

impl ChromeSession {
    fn page(&self) -> Result<&Page, RenderError> {
        self.page
            .as_ref()
            .ok_or_else(|| RenderError::Protocol("session has no open page".to_string()))
    }
}

#[async_trait]
impl RenderSession for ChromeSession {
    async fn set_headers(&mut self, headers: &BTreeMap<String, String>) -> Result<(), RenderError> {
        let page = self.page()?;
        page.execute(EnableParams::default()).await?;

        let headers = Headers::new(serde_json::to_value(headers)?);
        page.execute(SetExtraHttpHeadersParams::new(headers)).await?;
        Ok(())
    }

    async fn navigate(&mut self, url: &str) -> Result<(), RenderError> {
        let page = self.page()?;
        page.goto(url)
            .await
            .map_err(|e| RenderError::Navigation(e.to_string()))?;

        wait_for_root(move || page.find_element(ROOT_SELECTOR)).await
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>, RenderError> {
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .build();

        self.page()?
            .screenshot(params)
            .await
            .map_err(|e| RenderError::Screenshot(e.to_string()))
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if let Some(page) = self.page.take() {
            let _ = page.close().await;
        }
        if let Err(e) = self.browser.close().await {
            debug!("Session {} browser close failed: {}", self.id, e);
        }
        let _ = self.browser.wait().await;
        self.handler.abort();
        self.profile.remove().await;

        debug!("Closed render session {}", self.id);
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        // Abandoned mid-operation (timeout). Dropping `browser` kills the
        // child process and `profile` removes itself; only the handler remains.
        if !self.closed {
            self.handler.abort();
        }
    }
}

/// Poll `lookup` until the root element exists.
///
/// Only a missing element is retried. Any other error means the page or the
/// DevTools connection is gone and is reported as a navigation failure.
async fn wait_for_root<F, Fut, T>(mut lookup: F) -> Result<(), RenderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CdpError>>,
{
    loop {
        match lookup().await {
            Ok(_) => return Ok(()),
            Err(e) if is_missing_element(&e) => sleep(ROOT_POLL_INTERVAL).await,
            Err(e) => {
                return Err(RenderError::Navigation(format!(
                    "lost page while waiting for <{ROOT_SELECTOR}>: {e}"
                )))
            }
        }
    }
}

/// Errors the browser answers with while the document has no matching node yet.
fn is_missing_element(err: &CdpError) -> bool {
    matches!(err, CdpError::NotFound | CdpError::Chrome(_))
}

/// Chromium profile directory owned by one session, removed on drop.
struct ProfileDir {
    path: PathBuf,
    removed: bool,
}

impl ProfileDir {
    async fn create(path: PathBuf) -> Result<Self, RenderError> {
        tokio::fs::create_dir_all(&path)
            .await
            .map_err(|e| RenderError::Launch(format!("Failed to create profile dir: {e}")))?;
        Ok(Self {
            path,
            removed: false,
        })
    }

    fn path(&self) -> &Path {
        &self.path
    }

    async fn remove(&mut self) {
        self.removed = true;
        let _ = tokio::fs::remove_dir_all(&self.path).await;
    }
}

impl Drop for ProfileDir {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        let path = std::mem::take(&mut self.path);
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn_blocking(move || {
                    let _ = std::fs::remove_dir_all(path);
                });
            }
            Err(_) => {
                let _ = std::fs::remove_dir_all(path);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_dirs_are_unique_per_session() {
        let renderer = ChromeRenderer::new(&Config::default());
        let a = renderer.profile_dir(0);
        let b = renderer.profile_dir(1);
        assert_ne!(a, b);
        assert!(a
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("urlshot-")));
    }

    #[tokio::test]
    async fn test_wait_for_root_retries_until_element_appears() {
        let mut calls = 0;
        let result = wait_for_root(|| {
            calls += 1;
            let attempt = calls;
            async move {
                if attempt < 3 {
                    Err(CdpError::NotFound)
                } else {
                    Ok(())
                }
            }
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn test_wait_for_root_fails_when_connection_is_lost() {
        let mut calls = 0;
        let result = wait_for_root(|| {
            calls += 1;
            async { Err::<(), _>(CdpError::NoResponse) }
        })
        .await;

        assert!(matches!(result, Err(RenderError::Navigation(_))));
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn test_profile_dir_removed_on_close() {
        let root = tempfile::TempDir::new().unwrap();
        let path = root.path().join("urlshot-test-0");

        let mut profile = ProfileDir::create(path.clone()).await.unwrap();
        assert!(path.is_dir());
        profile.remove().await;
        assert!(!path.exists());
    }

    #[test]
    fn test_profile_dir_removed_when_abandoned() {
        let root = tempfile::TempDir::new().unwrap();
        let path = root.path().join("urlshot-test-1");

        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        let profile = runtime
            .block_on(ProfileDir::create(path.clone()))
            .unwrap();
        std::fs::write(path.join("Local State"), "{}").unwrap();

        drop(profile);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_profile_dir_dropped_inside_runtime_is_cleaned_up() {
        let root = tempfile::TempDir::new().unwrap();
        let path = root.path().join("urlshot-test-2");

        drop(ProfileDir::create(path.clone()).await.unwrap());

        for _ in 0..50 {
            if !path.exists() {
                break;
            }
            sleep(Duration::from_millis(20)).await;
        }
        assert!(!path.exists());
    }
}

//! # urlshot
//!
//! Bulk web screenshot capture. Every URL in a list is rendered in its own
//! headless Chromium session and written to the output directory as
//! `<sanitized-url>_<YYYYMMDD_HHMMSS>.png`. A failure on one URL (timeout,
//! DNS error, crashed renderer, unwritable file) is logged and never stops
//! the rest of the batch.
//!
//! ## Pipeline
//!
//! ```text
//! URL list -> Dispatcher -> worker -> CaptureInvoker -> RenderSession
//!                                         |
//!                                         +-> sanitized file name -> PNG on disk
//! ```
//!
//! - **Dispatcher**: a fixed pool of N workers sharing one bounded FIFO
//!   queue. At most N captures are in flight, every URL is claimed exactly
//!   once, and [`Dispatcher::run`] returns only after every worker exited.
//! - **CaptureInvoker**: one attempt per URL under an optional deadline,
//!   classified as `Timeout`, `CaptureFailure` or `PersistFailure`.
//! - **Renderer / RenderSession**: the browser seam. [`ChromeRenderer`]
//!   launches a fresh Chromium per session so proxy and header settings can
//!   never leak between URLs.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use urlshot::{parse_headers, CaptureInvoker, ChromeRenderer, Config, Dispatcher};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Arc::new(Config {
//!         output_dir: "screenshots".into(),
//!         timeout: Some(Duration::from_secs(15)),
//!         headers: parse_headers("User-Agent: recon/1.0"),
//!         ..Default::default()
//!     });
//!
//!     let renderer = Arc::new(ChromeRenderer::new(&config));
//!     let invoker = Arc::new(CaptureInvoker::new(renderer, config.clone()));
//!     Dispatcher::new(config.threads, invoker)
//!         .run(vec!["https://example.com".to_string()])
//!         .await;
//! }
//! ```
//!
//! ## CLI Usage
//!
//! ```bash
//! urlshot -u https://example.com -o shots
//! urlshot -f urls.txt -o shots -threads 8 -t 20 -proxy http://127.0.0.1:8080 -H "Cookie: a=b"
//! ```

/// Configuration and settings for the screenshot tool
pub mod config;

/// Error types and error handling utilities
pub mod error;

/// Rendering capability and the headless Chromium implementation
pub mod browser;

/// Single-URL capture with deadline and persistence
pub mod capture;

/// Worker pool dispatching URLs to captures
pub mod worker;

/// Command-line interface implementation
pub mod cli;

/// Parsing of the `-H` header list
pub mod headers;

/// Capture outcome metrics
pub mod telemetry;

/// Utility functions and helpers
pub mod utils;


pub use browser::*;
pub use capture::*;
pub use cli::*;
pub use config::*;
pub use error::*;
pub use headers::*;
pub use utils::*;
pub use worker::*;

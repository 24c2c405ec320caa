//! Capture outcome metrics
//!
//! Recorded through the `metrics` facade. Nothing is exported unless the
//! embedding application installs a recorder.

use crate::CaptureError;
use std::time::Duration;

pub const CAPTURES_TOTAL: &str = "screenshot_captures_total";
pub const CAPTURE_SECONDS: &str = "screenshot_capture_seconds";
pub const WORKERS_ACTIVE: &str = "screenshot_workers_active";

/// Record the outcome of one capture attempt.
pub fn record_capture(outcome: Result<(), &CaptureError>, duration: Duration) {
    let label = outcome_label(outcome);
    ::metrics::increment_counter!(CAPTURES_TOTAL, "outcome" => label);
    ::metrics::histogram!(CAPTURE_SECONDS, duration.as_secs_f64(), "outcome" => label);
}

pub fn record_active_workers(count: usize) {
    ::metrics::gauge!(WORKERS_ACTIVE, count as f64);
}

fn outcome_label(outcome: Result<(), &CaptureError>) -> &'static str {
    match outcome {
        Ok(()) => "success",
        Err(e) => e.kind(),
    }
}

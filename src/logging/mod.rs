//! Logging
//!
//! [`init_logging`] installs the subscriber. The macros below give unit and
//! retry events the same field names wherever they are emitted.

pub mod structured;

pub use structured::{init_logging, LoggingGuard};

/// A page unit attempt is starting
#[macro_export]
macro_rules! log_unit_start {
    ($page:expr, $attempt:expr) => {
        tracing::info!(page = $page, attempt = $attempt, "Starting page unit");
    };
}

/// A page unit finished; `$duration` is a `std::time::Duration`
#[macro_export]
macro_rules! log_unit_complete {
    ($page:expr, $records:expr, $rows:expr, $duration:expr) => {
        tracing::info!(
            page = $page,
            records = $records,
            rows = $rows,
            duration_ms = $duration.as_millis() as u64,
            "Page unit completed"
        );
    };
}

#[macro_export]
macro_rules! log_retry_attempt {
    ($retry:expr, $max_retries:expr, $reason:expr) => {
        tracing::warn!(
            retry = $retry,
            max_retries = $max_retries,
            reason = %$reason,
            "Retrying after transient error"
        );
    };
}

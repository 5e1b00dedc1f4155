//! `tracing` subscriber setup
//!
//! Human-readable events go to stderr. With `logging.local_enabled` a second
//! layer writes JSON lines to `{local_path}/pagefold.*.log`, rotated per
//! `logging.local_rotation`. `RUST_LOG` takes precedence over the level
//! passed in.

use crate::config::LoggingConfig;
use crate::domain::{PagefoldError, Result};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Flushes the JSON file writer when dropped
#[must_use = "dropping the guard stops file logging"]
pub struct LoggingGuard(Option<WorkerGuard>);

impl LoggingGuard {
    /// Whether events are also written to a log file
    pub fn writes_file(&self) -> bool {
        self.0.is_some()
    }
}

/// Installs the global subscriber
///
/// # Errors
///
/// Fails on an unknown level, when the log directory cannot be created, or
/// when a global subscriber is already installed.
pub fn init_logging(level: &str, config: &LoggingConfig) -> Result<LoggingGuard> {
    let level = parse_level(level)?;
    let filter = || {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("warn,pagefold={level}")))
    };

    let console = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .with_filter(filter());

    let (file, guard) = if config.local_enabled {
        let (writer, guard) = tracing_appender::non_blocking(file_appender(config)?);
        let layer = tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_thread_ids(true)
            .with_writer(writer)
            .with_filter(filter());
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init()
        .map_err(|e| PagefoldError::Configuration(format!("Failed to install logger: {e}")))?;

    tracing::debug!(
        level = %level,
        file = config.local_enabled,
        path = %config.local_path,
        "Logging initialized"
    );
    Ok(LoggingGuard(guard))
}

fn file_appender(config: &LoggingConfig) -> Result<RollingFileAppender> {
    std::fs::create_dir_all(&config.local_path).map_err(|e| {
        PagefoldError::Configuration(format!(
            "Failed to create log directory {}: {e}",
            config.local_path
        ))
    })?;

    RollingFileAppender::builder()
        .rotation(rotation(&config.local_rotation))
        .filename_prefix("pagefold")
        .filename_suffix("log")
        .build(&config.local_path)
        .map_err(|e| PagefoldError::Configuration(format!("Failed to open log file: {e}")))
}

fn rotation(name: &str) -> Rotation {
    match name {
        "hourly" => Rotation::HOURLY,
        "never" => Rotation::NEVER,
        _ => Rotation::DAILY,
    }
}

fn parse_level(name: &str) -> Result<Level> {
    name.parse().map_err(|_| {
        PagefoldError::Configuration(format!(
            "Invalid log level '{name}', expected trace, debug, info, warn or error"
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use test_case::test_case;

    #[test_case("trace", Level::TRACE)]
    #[test_case("Debug", Level::DEBUG)]
    #[test_case("INFO", Level::INFO)]
    #[test_case("warn", Level::WARN)]
    #[test_case("error", Level::ERROR)]
    fn test_parse_level(name: &str, expected: Level) {
        assert_eq!(parse_level(name).unwrap(), expected);
    }

    #[test]
    fn test_unknown_level_is_configuration_error() {
        let err = parse_level("chatty").unwrap_err();
        assert!(matches!(err, PagefoldError::Configuration(_)));
    }

    #[test]
    fn test_rotation_names() {
        assert_eq!(rotation("hourly"), Rotation::HOURLY);
        assert_eq!(rotation("never"), Rotation::NEVER);
        assert_eq!(rotation("daily"), Rotation::DAILY);
    }

    #[test]
    fn test_file_appender_creates_log_directory() {
        let dir = TempDir::new().unwrap();
        let config = LoggingConfig {
            local_enabled: true,
            local_path: dir.path().join("logs").display().to_string(),
            local_rotation: "never".to_string(),
        };

        file_appender(&config).unwrap();
        assert!(dir.path().join("logs").is_dir());
    }
}

//! Configuration management for Pagefold.
//!
//! Pagefold reads a TOML file with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `PAGEFOLD_<SECTION>_<KEY>` environment overrides
//! - Default values for optional settings
//! - Validation on load
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use pagefold::config::load_config;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("pagefold.toml")?;
//! println!("Page size: {}", config.extraction.page_size);
//! # Ok(())
//! # }
//! ```
//!
//! # Example Configuration
//!
//! ```toml
//! [application]
//! log_level = "info"
//!
//! [source]
//! connection_string = "${PAGEFOLD_SOURCE_URL}"
//!
//! [extraction]
//! page_size = 25
//! batch_size = 25
//!
//! [dispatch]
//! max_concurrent_units = 8
//! fan_in_timeout_seconds = 3600
//!
//! [convert]
//! enabled = true
//! program = "dcm2jpg"
//! args = ["-q", "1.0", "{input}", "{output}"]
//!
//! [storage]
//! enabled = true
//! bucket = "imaging-exports"
//! access_token = "${PAGEFOLD_STORAGE_TOKEN}"
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

// Re-export commonly used types
pub use loader::{load_config, parse_config};
pub use schema::{
    ApplicationConfig, CheckpointBackend, CheckpointConfig, ConvertConfig, DispatchConfig,
    DownloadConfig, ExtractionConfig, LoggingConfig, OutputConfig, PagefoldConfig, RetryConfig,
    SourceConfig, StorageConfig,
};
pub use secret::{secret_string, secret_string_opt, SecretString, SecretValue};

//! Domain error types
//!
//! This module defines the error hierarchy for Pagefold.
//! All errors are domain-specific and don't expose third-party types.

use thiserror::Error;

/// Main Pagefold error type
///
/// This is the primary error type used throughout the application.
/// It wraps specific error types and provides context for error handling.
#[derive(Debug, Error)]
pub enum PagefoldError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Relational source errors (count, page fetch)
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Per-artifact errors (download, conversion)
    #[error("Artifact error: {0}")]
    Artifact(#[from] ArtifactError),

    /// Object storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Checkpoint state errors
    #[error("State management error: {0}")]
    State(String),

    /// Tabular output errors
    #[error("Output error: {0}")]
    Output(String),

    /// The fan-in join did not complete within its deadline
    #[error("Fan-in timed out after {seconds}s with {pending} unit(s) outstanding")]
    FanInTimeout { seconds: u64, pending: usize },

    /// The run was interrupted by a shutdown signal
    #[error("Run interrupted: {0}")]
    Interrupted(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

impl PagefoldError {
    /// Whether the error is a transient infrastructure failure worth retrying
    ///
    /// Connection loss and timeouts are transient; missing artifacts, converter
    /// failures and malformed data are permanent.
    pub fn is_transient(&self) -> bool {
        match self {
            PagefoldError::Source(e) => e.is_transient(),
            PagefoldError::Artifact(e) => e.is_transient(),
            PagefoldError::Storage(_) => true,
            PagefoldError::Io(_) => true,
            _ => false,
        }
    }
}

/// Relational source errors
#[derive(Debug, Error)]
pub enum SourceError {
    /// Failed to obtain a connection
    #[error("Failed to connect to source: {0}")]
    ConnectionFailed(String),

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Statement exceeded its timeout
    #[error("Query timeout: {0}")]
    Timeout(String),

    /// A returned row could not be mapped to a source record
    #[error("Invalid row: {0}")]
    InvalidRow(String),
}

impl SourceError {
    /// Whether retrying the same query may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SourceError::ConnectionFailed(_) | SourceError::Timeout(_) | SourceError::QueryFailed(_)
        )
    }
}

/// Per-artifact errors
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// Network failure while downloading
    #[error("Download failed for {url}: {message}")]
    DownloadFailed { url: String, message: String },

    /// Server answered with an error status
    #[error("Download of {url} returned HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    /// The artifact URL cannot be parsed
    #[error("Invalid artifact URL: {0}")]
    InvalidUrl(String),

    /// The file to convert does not exist
    #[error("Artifact not found at {0}")]
    Missing(String),

    /// The converter ran but did not produce output
    #[error("Conversion failed for {path}: {message}")]
    ConversionFailed { path: String, message: String },

    /// Download or conversion exceeded its deadline
    #[error("Timed out: {0}")]
    Timeout(String),
}

impl ArtifactError {
    /// Whether retrying the same artifact operation may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            ArtifactError::DownloadFailed { .. } | ArtifactError::Timeout(_) => true,
            ArtifactError::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

// Conversion from std::io::Error
impl From<std::io::Error> for PagefoldError {
    fn from(err: std::io::Error) -> Self {
        PagefoldError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for PagefoldError {
    fn from(err: serde_json::Error) -> Self {
        PagefoldError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for PagefoldError {
    fn from(err: toml::de::Error) -> Self {
        PagefoldError::Configuration(format!("TOML parse error: {err}"))
    }
}

// Conversion from csv errors
impl From<csv::Error> for PagefoldError {
    fn from(err: csv::Error) -> Self {
        PagefoldError::Output(err.to_string())
    }
}

//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::{CheckpointBackend, PagefoldConfig};
use super::secret::{secret_string, secret_string_opt};
use crate::domain::errors::PagefoldError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (${VAR} syntax)
/// 3. Parses the TOML into PagefoldConfig
/// 4. Applies environment variable overrides (PAGEFOLD_* prefix)
/// 5. Validates the configuration
///
/// # Errors
///
/// Returns an error if the file cannot be read, parsing fails, a referenced
/// environment variable is missing, or validation fails.
///
/// # Examples
///
/// ```no_run
/// use pagefold::config::loader::load_config;
///
/// let config = load_config("pagefold.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<PagefoldConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(PagefoldError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        PagefoldError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    parse_config(&contents)
}

/// Parses, overrides and validates configuration from TOML text
pub fn parse_config(contents: &str) -> Result<PagefoldConfig> {
    let contents = substitute_env_vars(contents)?;

    let mut config: PagefoldConfig = toml::from_str(&contents)?;

    apply_env_overrides(&mut config);

    config.validate().map_err(|e| {
        PagefoldError::Configuration(format!("Configuration validation failed: {e}"))
    })?;

    Ok(config)
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// Comment lines are left untouched.
///
/// # Errors
///
/// Returns an error listing every referenced variable that is not set
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| PagefoldError::Configuration(format!("Invalid substitution pattern: {e}")))?;
    let mut lines = Vec::new();
    let mut missing_vars: Vec<String> = Vec::new();

    for line in input.lines() {
        if line.trim_start().starts_with('#') {
            lines.push(line.to_string());
            continue;
        }

        let processed = re.replace_all(line, |cap: &regex::Captures<'_>| {
            let var_name = &cap[1];
            match std::env::var(var_name) {
                Ok(value) => value,
                Err(_) => {
                    if !missing_vars.iter().any(|v| v == var_name) {
                        missing_vars.push(var_name.to_string());
                    }
                    String::new()
                }
            }
        });
        lines.push(processed.into_owned());
    }

    if !missing_vars.is_empty() {
        return Err(PagefoldError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(lines.join("\n"))
}

fn env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn env_parsed<T: FromStr>(name: &str) -> Option<T> {
    env(name).and_then(|v| v.parse().ok())
}

/// Applies environment variable overrides using PAGEFOLD_* prefix
///
/// Environment variables follow the pattern: PAGEFOLD_<SECTION>_<KEY>
/// For example: PAGEFOLD_EXTRACTION_PAGE_SIZE, PAGEFOLD_SOURCE_CONNECTION_STRING
fn apply_env_overrides(config: &mut PagefoldConfig) {
    // Application overrides
    if let Some(val) = env("PAGEFOLD_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }
    if let Some(val) = env_parsed("PAGEFOLD_APPLICATION_DRY_RUN") {
        config.application.dry_run = val;
    }

    // Source overrides
    if let Some(val) = env("PAGEFOLD_SOURCE_CONNECTION_STRING") {
        config.source.connection_string = secret_string(val);
    }
    if let Some(val) = env_parsed("PAGEFOLD_SOURCE_MAX_CONNECTIONS") {
        config.source.max_connections = val;
    }
    if let Some(val) = env("PAGEFOLD_SOURCE_SSL_MODE") {
        config.source.ssl_mode = val;
    }

    // Extraction overrides
    if let Some(val) = env_parsed("PAGEFOLD_EXTRACTION_PAGE_SIZE") {
        config.extraction.page_size = val;
    }
    if let Some(val) = env_parsed("PAGEFOLD_EXTRACTION_BATCH_SIZE") {
        config.extraction.batch_size = val;
    }

    // Dispatch overrides
    if let Some(val) = env_parsed("PAGEFOLD_DISPATCH_MAX_CONCURRENT_UNITS") {
        config.dispatch.max_concurrent_units = val;
    }
    if let Some(val) = env_parsed("PAGEFOLD_DISPATCH_FAN_IN_TIMEOUT_SECONDS") {
        config.dispatch.fan_in_timeout_seconds = val;
    }
    if let Some(val) = env_parsed("PAGEFOLD_DISPATCH_MAX_RETRIES") {
        config.dispatch.retry.max_retries = val;
    }

    // Convert overrides
    if let Some(val) = env_parsed("PAGEFOLD_CONVERT_ENABLED") {
        config.convert.enabled = val;
    }
    if let Some(val) = env("PAGEFOLD_CONVERT_PROGRAM") {
        config.convert.program = val;
    }

    // Output overrides
    if let Some(val) = env("PAGEFOLD_OUTPUT_DIRECTORY") {
        config.output.directory = val;
    }
    if let Some(val) = env_parsed("PAGEFOLD_OUTPUT_APPEND_EXISTING") {
        config.output.append_existing = val;
    }

    // Checkpoint overrides
    if let Some(val) = env("PAGEFOLD_CHECKPOINT_BACKEND") {
        match val.to_ascii_lowercase().as_str() {
            "file" => config.checkpoint.backend = CheckpointBackend::File,
            "postgresql" => config.checkpoint.backend = CheckpointBackend::PostgreSQL,
            _ => {}
        }
    }
    if let Some(val) = env("PAGEFOLD_CHECKPOINT_PATH") {
        config.checkpoint.path = val;
    }
    if let Some(val) = env_parsed("PAGEFOLD_CHECKPOINT_LEDGER_RETENTION_DAYS") {
        config.checkpoint.ledger_retention_days = Some(val);
    }

    // Storage overrides
    if let Some(val) = env_parsed("PAGEFOLD_STORAGE_ENABLED") {
        config.storage.enabled = val;
    }
    if let Some(val) = env("PAGEFOLD_STORAGE_BUCKET") {
        config.storage.bucket = val;
    }
    if let Some(val) = env("PAGEFOLD_STORAGE_ENDPOINT") {
        config.storage.endpoint = val;
    }
    if let Some(token) = secret_string_opt(env("PAGEFOLD_STORAGE_ACCESS_TOKEN")) {
        config.storage.access_token = Some(token);
    }

    // Logging overrides
    if let Some(val) = env_parsed("PAGEFOLD_LOGGING_LOCAL_ENABLED") {
        config.logging.local_enabled = val;
    }
    if let Some(val) = env("PAGEFOLD_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }
}

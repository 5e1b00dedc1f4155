//! Validate config command implementation
//!
//! This module implements the `validate-config` command for validating
//! the Pagefold configuration file.

use crate::adapters::postgresql::client::redact_connection_string;
use crate::config::load_config;
use crate::config::schema::{CheckpointBackend, PagefoldConfig};
use clap::Args;
use secrecy::ExposeSecret;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    ///
    /// Loading already validates; a failure is reported with exit code 2.
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("🔍 Validating configuration file: {config_path}");
        println!();

        match load_config(config_path) {
            Ok(config) => {
                println!("✅ Configuration is valid");
                println!();
                print_summary(&config);
                Ok(0)
            }
            Err(e) => {
                println!("❌ Configuration validation failed");
                println!("   Error: {e}");
                println!();
                Ok(2)
            }
        }
    }
}

fn print_summary(config: &PagefoldConfig) {
    println!("Configuration Summary:");
    println!("  Log Level: {}", config.application.log_level);
    println!("  Dry Run: {}", config.application.dry_run);
    println!(
        "  Source: {}",
        redact_connection_string(config.source.connection_string.expose_secret().as_ref())
    );
    println!(
        "  Page Size: {} (batches of {})",
        config.extraction.page_size, config.extraction.batch_size
    );
    println!(
        "  Concurrent Units: {} (fan-in timeout {}s, {} retries)",
        config.dispatch.max_concurrent_units,
        config.dispatch.fan_in_timeout_seconds,
        config.dispatch.retry.max_retries
    );
    if config.convert.enabled {
        println!(
            "  Conversion: {} -> .{}",
            config.convert.program, config.convert.target_extension
        );
    } else {
        println!("  Conversion: disabled");
    }
    println!(
        "  Output: {}/{}",
        config.output.directory, config.output.table_file_name
    );
    match config.checkpoint.backend {
        CheckpointBackend::File => println!("  Checkpoint: file {}", config.checkpoint.path),
        CheckpointBackend::PostgreSQL => println!(
            "  Checkpoint: postgresql id '{}'",
            config.checkpoint.checkpoint_id
        ),
    }
    if config.storage.enabled {
        println!(
            "  Publish: {} bucket {}",
            config.storage.endpoint, config.storage.bucket
        );
    } else {
        println!("  Publish: disabled");
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_valid_file_is_exit_code_0() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[source]\nconnection_string = \"postgresql://reader:pw@localhost:5432/imaging\""
        )
        .unwrap();

        let code = ValidateArgs {}
            .execute(file.path().to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(code, 0);
    }

    #[tokio::test]
    async fn test_invalid_file_is_exit_code_2() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[source]\nconnection_string = \"postgresql://localhost/db\"\n\n[extraction]\npage_size = 0"
        )
        .unwrap();

        let code = ValidateArgs {}
            .execute(file.path().to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(code, 2);
    }
}

//! Extract command implementation
//!
//! Runs one extraction: load the checkpoint, dispatch every remaining page,
//! fan in, merge and persist.

use crate::adapters::build_collaborators;
use crate::config::{load_config, PagefoldConfig};
use crate::core::export::{ExtractionCoordinator, RunOutcome, RunSummary};
use clap::Args;
use tokio::sync::watch;

/// Arguments for the extract command
#[derive(Args, Debug)]
pub struct ExtractArgs {
    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Dry run mode - fetch and fold only; no downloads, uploads or checkpoint writes
    #[arg(long)]
    pub dry_run: bool,

    /// Override dispatch.max_concurrent_units
    #[arg(long, value_name = "N")]
    pub max_concurrent_units: Option<usize>,

    /// Override dispatch.fan_in_timeout_seconds
    #[arg(long, value_name = "SECONDS")]
    pub fan_in_timeout: Option<u64>,

    /// Print the run summary as JSON
    #[arg(long)]
    pub json: bool,
}

impl ExtractArgs {
    /// Apply command-line overrides on top of the loaded configuration
    fn apply_overrides(&self, config: &mut PagefoldConfig) {
        if self.dry_run {
            tracing::info!("Enabling dry-run mode from CLI");
            config.application.dry_run = true;
        }
        if let Some(units) = self.max_concurrent_units {
            tracing::info!(max_concurrent_units = units, "Overriding concurrency from CLI");
            config.dispatch.max_concurrent_units = units;
        }
        if let Some(seconds) = self.fan_in_timeout {
            tracing::info!(fan_in_timeout_seconds = seconds, "Overriding fan-in timeout from CLI");
            config.dispatch.fan_in_timeout_seconds = seconds;
        }
    }

    /// Execute the extract command
    pub async fn execute(
        &self,
        config_path: &str,
        shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        tracing::info!("Starting extract command");

        let mut config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load configuration");
                eprintln!("Failed to load configuration: {e}");
                return Ok(2);
            }
        };

        self.apply_overrides(&mut config);

        if let Err(e) = config.validate() {
            tracing::error!(error = %e, "Configuration validation failed");
            eprintln!("Configuration validation failed: {e}");
            return Ok(2);
        }

        let dry_run = config.application.dry_run;
        if dry_run {
            println!("🔍 DRY RUN MODE - no downloads, uploads or checkpoint writes");
            println!();
        }

        if !self.yes && !dry_run {
            println!("Extraction Configuration:");
            println!("  Page size: {}", config.extraction.page_size);
            println!("  Batch size: {}", config.extraction.batch_size);
            println!("  Concurrent units: {}", config.dispatch.max_concurrent_units);
            println!("  Fan-in timeout: {}s", config.dispatch.fan_in_timeout_seconds);
            println!("  Output: {}", config.output.directory);
            println!();
            print!("Proceed with extraction? [y/N]: ");
            use std::io::{self, Write};
            io::stdout().flush()?;

            let mut input = String::new();
            io::stdin().read_line(&mut input)?;

            if !input.trim().eq_ignore_ascii_case("y") {
                println!("Extraction cancelled.");
                return Ok(0);
            }
        }

        let collaborators = match build_collaborators(&config).await {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = %e, "Failed to initialise collaborators");
                eprintln!("Failed to initialise extraction: {e}");
                return Ok(5);
            }
        };

        let coordinator = ExtractionCoordinator::new(&config, collaborators, shutdown_signal);

        println!("🚀 Starting extraction...");
        println!();

        let summary = match coordinator.run().await {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(error = %e, "Extraction failed");
                eprintln!("Extraction failed: {e}");
                return Ok(5);
            }
        };

        if self.json {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        } else {
            print_summary(&summary);
        }

        Ok(summary.exit_code())
    }
}

fn print_summary(summary: &RunSummary) {
    println!();
    println!("📊 Extraction Summary:");
    println!("  Run: {}", summary.run_id);
    println!("  Source rows: {}", summary.total_rows);
    println!(
        "  Pages: {} dispatched from page {}, {} succeeded, {} failed",
        summary.pages_dispatched, summary.start_page, summary.pages_succeeded, summary.pages_failed
    );
    println!("  Records processed: {}", summary.records_processed);
    println!("  Artifacts found: {}", summary.artifacts_found);
    println!("  Rows produced: {}", summary.rows_produced);
    println!("  Downloaded: {}", summary.downloaded);
    println!("  Converted: {}", summary.converted);
    println!("  Uploaded: {}", summary.uploaded);
    println!("  New keys: {} (ledger {})", summary.new_keys, summary.ledger_size);
    if let Some(path) = &summary.table_path {
        println!("  Table: {}", path.display());
    }
    if let Some(checksum) = &summary.table_checksum {
        println!("  SHA-256: {checksum}");
    }
    println!("  Next run resumes at page {}", summary.resume_page);
    println!("  Duration: {:.2}s", summary.duration.as_secs_f64());
    println!("  Success Rate: {:.2}%", summary.success_rate());
    println!();

    if summary.error_count > 0 {
        println!("⚠️  Errors encountered ({}):", summary.error_count);
        for error in &summary.errors {
            println!("  - {error}");
        }
        if summary.error_count > summary.errors.len() {
            println!("  ... and {} more", summary.error_count - summary.errors.len());
        }
        println!();
    }

    match summary.outcome {
        RunOutcome::Completed => println!("✅ Extraction completed successfully!"),
        RunOutcome::Partial => {
            println!("⚠️  Extraction completed with failures");
            println!("   Failed pages are dispatched again on the next run.");
        }
        RunOutcome::TimedOut => {
            println!("⏱️  Fan-in timed out; nothing was merged and the checkpoint is unchanged.");
        }
        RunOutcome::Interrupted => {
            println!("⚠️  Extraction interrupted; nothing was merged and the checkpoint is unchanged.");
            println!("   Run the same command to resume.");
        }
    }
}

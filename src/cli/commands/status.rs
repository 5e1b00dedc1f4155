//! Status command implementation
//!
//! Prints the persisted checkpoint: resume page, ledger size and last update.

use crate::adapters::database::{create_checkpoint_storage, create_source_client};
use crate::config::load_config;
use crate::core::state::{Checkpoint, CheckpointStore};
use clap::Args;

/// Arguments for the status command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Print the checkpoint summary as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, serde::Serialize)]
struct StatusReport<'a> {
    checkpoint_id: &'a str,
    location: String,
    resume_page: u64,
    total_pages: Option<u64>,
    complete: bool,
    processed_keys: usize,
    last_run_id: Option<&'a str>,
    updated_at: Option<String>,
}

impl<'a> StatusReport<'a> {
    fn new(checkpoint: &'a Checkpoint, location: String) -> Self {
        Self {
            checkpoint_id: &checkpoint.checkpoint_id,
            location,
            resume_page: checkpoint.resume_page,
            total_pages: checkpoint.total_pages,
            complete: checkpoint.is_complete(),
            processed_keys: checkpoint.processed_keys.len(),
            last_run_id: checkpoint.last_run_id.as_deref(),
            updated_at: checkpoint
                .updated_at
                .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string()),
        }
    }
}

impl StatusArgs {
    /// Execute the status command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!("Checking extraction status");

        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Failed to load configuration file");
                println!("   Error: {e}");
                return Ok(2);
            }
        };

        let storage = match create_source_client(&config) {
            Ok(client) => create_checkpoint_storage(&config, &client).await,
            Err(e) => Err(e),
        };
        let storage = match storage {
            Ok(s) => s,
            Err(e) => {
                println!("❌ Failed to open checkpoint storage");
                println!("   Error: {e}");
                return Ok(5);
            }
        };

        let store = CheckpointStore::new_with_storage(storage, &config.checkpoint.checkpoint_id);
        let checkpoint = match store.load().await {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Failed to load checkpoint");
                println!("   Error: {e}");
                return Ok(5);
            }
        };

        let report = StatusReport::new(&checkpoint, store.describe());
        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            print_report(&report);
        }
        Ok(0)
    }
}

fn print_report(report: &StatusReport<'_>) {
    println!("📊 Extraction Status");
    println!();
    println!("  Checkpoint: {} ({})", report.checkpoint_id, report.location);

    let Some(updated_at) = &report.updated_at else {
        println!("  No extraction has been recorded yet.");
        println!("  Run 'pagefold extract' to start.");
        return;
    };

    let total = report
        .total_pages
        .map(|t| t.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let state = if report.complete { "✅ Complete" } else { "🔄 In progress" };

    println!("  State: {state}");
    println!("  Resume page: {} of {total}", report.resume_page);
    println!("  Processed keys: {}", report.processed_keys);
    println!("  Last run: {}", report.last_run_id.unwrap_or("-"));
    println!("  Updated: {updated_at}");
    println!();
}

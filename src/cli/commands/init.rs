//! Init command implementation
//!
//! This module implements the `init` command for generating a sample
//! configuration file.

use clap::Args;
use std::fs;
use std::path::Path;

/// Arguments for the init command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Path where to create the configuration file
    #[arg(short, long, default_value = "pagefold.toml")]
    pub output: String,

    /// Include every section with comments
    #[arg(long)]
    pub with_examples: bool,

    /// Overwrite existing file
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    /// Execute the init command
    pub async fn execute(&self) -> anyhow::Result<i32> {
        tracing::info!(output = %self.output, "Initializing configuration file");

        println!("📝 Initializing Pagefold configuration");
        println!();

        if Path::new(&self.output).exists() && !self.force {
            println!("❌ Configuration file already exists: {}", self.output);
            println!("   Use --force to overwrite");
            return Ok(2);
        }

        let config_content = if self.with_examples {
            Self::generate_config_with_examples()
        } else {
            Self::generate_minimal_config()
        };

        match fs::write(&self.output, config_content) {
            Ok(_) => {
                println!("✅ Configuration file created: {}", self.output);
                println!();
                println!("Next steps:");
                println!("  1. Edit {} with your settings", self.output);
                println!("  2. Create a .env file with PAGEFOLD_SOURCE_URL (and PAGEFOLD_STORAGE_TOKEN if publishing)");
                println!("  3. Validate configuration: pagefold validate-config");
                println!("  4. Run an extraction: pagefold extract");
                println!();
                Ok(0)
            }
            Err(e) => {
                println!("❌ Failed to write configuration file");
                println!("   Error: {e}");
                Ok(5)
            }
        }
    }

    /// Generate minimal configuration
    fn generate_minimal_config() -> String {
        r#"# Pagefold Configuration File

[application]
log_level = "info"
dry_run = false

[source]
connection_string = "${PAGEFOLD_SOURCE_URL}"

[extraction]
page_size = 25
batch_size = 25

[dispatch]
max_concurrent_units = 8
fan_in_timeout_seconds = 3600

[output]
directory = "output"
table_file_name = "extraction.csv"

[checkpoint]
backend = "file"
path = ".pagefold/checkpoint.json"

[logging]
local_enabled = true
local_path = "logs"
local_rotation = "daily"
"#
        .to_string()
    }

    /// Generate configuration with every section documented
    fn generate_config_with_examples() -> String {
        r#"# Pagefold Configuration File
#
# Values of the form ${VAR} are read from the environment (or a .env file).
# Any key can also be overridden with PAGEFOLD_<SECTION>_<KEY>.

# ============================================================================
# Application
# ============================================================================
[application]
# trace | debug | info | warn | error
log_level = "info"

# Fetch and fold only; skip downloads, conversion, uploads and checkpoint writes
dry_run = false

# ============================================================================
# Source database (PostgreSQL)
# ============================================================================
[source]
connection_string = "${PAGEFOLD_SOURCE_URL}"
max_connections = 10
connection_timeout_seconds = 30
statement_timeout_seconds = 120

# disable | prefer | require | verify-ca | verify-full
ssl_mode = "prefer"

count_query = "SELECT COUNT(*) FROM extraction_rows"

# $1 = offset, $2 = limit. The ORDER BY must be deterministic.
page_query = """
SELECT parent_id, group_id, item_id, artifact_path, artifact_url, text_value,
       text_created_at, group_number, item_number
FROM extraction_rows
ORDER BY parent_id, group_number, item_number, artifact_path, text_created_at
OFFSET $1 LIMIT $2
"""

# ============================================================================
# Paging
# ============================================================================
[extraction]
# Rows per page; one unit of work is dispatched per page
page_size = 25

# Rows per fold batch inside a unit (must be <= page_size)
batch_size = 25

# ============================================================================
# Dispatch and fan-in
# ============================================================================
[dispatch]
max_concurrent_units = 8

# A single deadline for the whole fan-in; on expiry nothing is merged
fan_in_timeout_seconds = 3600

# Whole-page retries for transient failures
[dispatch.retry]
max_retries = 2
initial_delay_ms = 30000
max_delay_ms = 300000
backoff_multiplier = 2.0

# ============================================================================
# Artifact download
# ============================================================================
[download]
timeout_seconds = 60
artifact_extension = "dcm"

[download.retry]
max_retries = 3
initial_delay_ms = 1000
max_delay_ms = 30000
backoff_multiplier = 2.0

# ============================================================================
# Format conversion (external program)
# ============================================================================
[convert]
enabled = false
program = "dcm2jpg"
args = ["-q", "1.0", "{input}", "{output}"]
target_extension = "jpg"
timeout_seconds = 60

[convert.retry]
max_retries = 2
initial_delay_ms = 1000
max_delay_ms = 10000
backoff_multiplier = 2.0

# ============================================================================
# Output table
# ============================================================================
[output]
directory = "output"
table_file_name = "extraction.csv"

# Keep rows from earlier runs; false makes each run replace the table
append_existing = true

# ============================================================================
# Checkpoint
# ============================================================================
[checkpoint]
# file | postgresql
backend = "file"
path = ".pagefold/checkpoint.json"

# Row id in pagefold_checkpoints (postgresql backend)
checkpoint_id = "default"

# Drop ledger keys first emitted more than N days ago (unbounded when unset)
# ledger_retention_days = 365

# ============================================================================
# Object storage publish
# ============================================================================
[storage]
enabled = false
endpoint = "https://storage.googleapis.com"
bucket = "imaging-exports"
access_token = "${PAGEFOLD_STORAGE_TOKEN}"
table_prefix = "tables"
artifacts_prefix = "artifacts"
converted_prefix = "converted"
timeout_seconds = 60

# ============================================================================
# Logging
# ============================================================================
[logging]
local_enabled = true
local_path = "logs"

# daily | hourly | never
local_rotation = "daily"
"#
        .to_string()
    }
}

//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for Pagefold using clap.

pub mod commands;

use clap::{Parser, Subcommand};

/// Pagefold - resumable paged extraction with parallel fan-out
#[derive(Parser, Debug)]
#[command(name = "pagefold")]
#[command(version, about, long_about = None)]
#[command(author = "Pagefold Contributors")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "pagefold.toml", env = "PAGEFOLD_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "PAGEFOLD_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one extraction: dispatch the remaining pages and merge the results
    Extract(commands::extract::ExtractArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),

    /// Show the persisted checkpoint
    Status(commands::status::StatusArgs),

    /// Initialize a new configuration file
    Init(commands::init::InitArgs),
}

// Pagefold - resumable paged extraction with parallel fan-out
// Copyright (c) 2025 Pagefold Contributors
// Licensed under the MIT License

//! # Pagefold - resumable paged extraction
//!
//! Pagefold reads a large record set from PostgreSQL page by page, runs one
//! unit of work per page on a bounded worker pool, folds rows into
//! deduplicated output rows plus staged binary artifacts, and persists a
//! checkpoint so that an interrupted run resumes without emitting a key twice.
//!
//! ## Architecture
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Paging, folding, checkpoint state, dispatch and fan-in, output
//! - [`adapters`] - PostgreSQL, checkpoint storage, downloader, converter, uploader
//! - [`domain`] - Identifiers, records and the error hierarchy
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pagefold::adapters::build_collaborators;
//! use pagefold::config::load_config;
//! use pagefold::core::export::ExtractionCoordinator;
//! use tokio::sync::watch;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = load_config("pagefold.toml")?;
//!     let collaborators = build_collaborators(&config).await?;
//!
//!     let (_shutdown_tx, shutdown_rx) = watch::channel(false);
//!     let coordinator = ExtractionCoordinator::new(&config, collaborators, shutdown_rx);
//!
//!     let summary = coordinator.run().await?;
//!     println!("{} rows, resume at page {}", summary.rows_produced, summary.resume_page);
//!     std::process::exit(summary.exit_code());
//! }
//! ```
//!
//! ## Idempotent folding
//!
//! A key identifies one `(parent, group, item)` artifact. Keys already in the
//! ledger are skipped, so re-running a page after a crash emits nothing new:
//!
//! ```rust
//! use pagefold::core::state::IdempotencyLedger;
//! use pagefold::core::transform::RecordFolder;
//!
//! let folder = RecordFolder::new("output", "dcm");
//! let ledger = IdempotencyLedger::new();
//! let folded = folder.fold(&[], &ledger);
//! assert!(folded.new_keys.is_empty());
//! ```
//!
//! ## Error Handling
//!
//! Library code returns [`domain::Result`] with [`domain::PagefoldError`].
//! [`domain::PagefoldError::is_transient`] separates retryable failures from
//! permanent per-item ones.

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;

//! Core business logic for Pagefold.
//!
//! # Modules
//!
//! - [`extract`] - Page fetching seam, page arithmetic and batch splitting
//! - [`transform`] - Folding rows into artifact records and parent texts
//! - [`state`] - Checkpoint and idempotency ledger
//! - [`export`] - Unit of work, scheduler and the dispatch/fan-in coordinator
//! - [`output`] - CSV table writer
//! - [`retry`] - Bounded exponential backoff
//!
//! # Run Workflow
//!
//! 1. **Load Checkpoint**: resume page and the ledger of emitted keys
//! 2. **Count**: total source rows, hence total pages
//! 3. **Dispatch**: one unit per page in `[resume_page, total_pages)`
//! 4. **Fan-in**: a single bounded wait for every unit
//! 5. **Merge**: keys and rows of succeeded units, in completion order
//! 6. **Checkpoint**: advance over the contiguous succeeded prefix and save
//! 7. **Output**: write the table and publish it with the artifact trees
//!
//! # Example
//!
//! ```rust,no_run
//! use pagefold::adapters::build_collaborators;
//! use pagefold::config::load_config;
//! use pagefold::core::export::ExtractionCoordinator;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("pagefold.toml")?;
//! let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//!
//! let collaborators = build_collaborators(&config).await?;
//! let coordinator = ExtractionCoordinator::new(&config, collaborators, shutdown_rx);
//! let summary = coordinator.run().await?;
//!
//! println!("Rows: {}", summary.rows_produced);
//! println!("Resume page: {}", summary.resume_page);
//! # Ok(())
//! # }
//! ```

pub mod export;
pub mod extract;
pub mod output;
pub mod retry;
pub mod state;
pub mod transform;

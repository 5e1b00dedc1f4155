//! External system integrations for Pagefold.
//!
//! - [`postgresql`] - source database: pooled client, page fetcher, checkpoint table
//! - [`database`] - checkpoint storage trait, file backend and the collaborator factory
//! - [`artifacts`] - HTTP downloader, external-program converter, object storage uploader
//!
//! Adapters isolate external dependencies behind the traits the core consumes,
//! so the extraction pipeline can be exercised with in-memory doubles.
//!
//! ```rust,no_run
//! use pagefold::adapters::build_collaborators;
//! use pagefold::config::load_config;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("pagefold.toml")?;
//! let collaborators = build_collaborators(&config).await?;
//! let checkpoint = collaborators.checkpoint_storage.load_checkpoint().await?;
//! # Ok(())
//! # }
//! ```

pub mod artifacts;
pub mod database;
pub mod postgresql;

pub use database::build_collaborators;

//! Checkpoint storage abstraction
//!
//! This module provides a trait-based abstraction for checkpoint persistence,
//! allowing Pagefold to keep its state in a local JSON file or in PostgreSQL.

pub mod factory;
pub mod file;
pub mod traits;

pub use factory::{
    build_collaborators, create_checkpoint_storage, create_page_fetcher, create_source_client,
};
pub use file::FileCheckpointStorage;
pub use traits::CheckpointStorage;

//! Checkpoint storage abstraction
//!
//! This module defines the trait that checkpoint backends must implement.

use crate::core::state::Checkpoint;
use crate::domain::Result;
use async_trait::async_trait;

/// Durable storage for the single checkpoint document
#[async_trait]
pub trait CheckpointStorage: Send + Sync {
    /// Load the checkpoint
    ///
    /// # Returns
    ///
    /// Returns `Ok(Some(Checkpoint))` if found, `Ok(None)` if not found.
    ///
    /// # Errors
    ///
    /// Returns `PagefoldError::Serialization` when the stored document cannot
    /// be decoded, and a storage or I/O error when the backend is unreachable.
    async fn load_checkpoint(&self) -> Result<Option<Checkpoint>>;

    /// Save the checkpoint, replacing any previous version atomically
    ///
    /// # Arguments
    ///
    /// * `checkpoint` - Checkpoint to save
    /// * `dry_run` - If true, skip the actual write
    async fn save_checkpoint(&self, checkpoint: &Checkpoint, dry_run: bool) -> Result<()>;

    /// Human-readable location, for logs and the status command
    fn describe(&self) -> String;
}

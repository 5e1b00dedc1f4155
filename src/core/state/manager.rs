//! Checkpoint store
//!
//! Loads and saves the run checkpoint through a [`CheckpointStorage`] backend.

use crate::adapters::database::traits::CheckpointStorage;
use crate::core::state::checkpoint::Checkpoint;
use crate::domain::{PagefoldError, Result};
use chrono::{Duration, Utc};
use std::sync::Arc;

/// Checkpoint persistence with corruption tolerance and ledger retention
pub struct CheckpointStore {
    storage: Arc<dyn CheckpointStorage>,
    checkpoint_id: String,
    retention: Option<Duration>,
}

impl CheckpointStore {
    /// Create a new CheckpointStore with a storage backend
    pub fn new_with_storage(storage: Arc<dyn CheckpointStorage>, checkpoint_id: &str) -> Self {
        Self {
            storage,
            checkpoint_id: checkpoint_id.to_string(),
            retention: None,
        }
    }

    /// Drop ledger keys older than `days` whenever the checkpoint is loaded
    pub fn with_retention_days(mut self, days: Option<u32>) -> Self {
        self.retention = days.map(|d| Duration::days(i64::from(d)));
        self
    }

    pub fn describe(&self) -> String {
        self.storage.describe()
    }

    /// Load the checkpoint
    ///
    /// A missing or undecodable checkpoint yields an empty one.
    ///
    /// # Errors
    ///
    /// Storage connectivity errors are returned so that an outage never
    /// silently restarts the run from page 0.
    pub async fn load(&self) -> Result<Checkpoint> {
        let mut checkpoint = match self.storage.load_checkpoint().await {
            Ok(Some(checkpoint)) => {
                tracing::info!(
                    location = %self.storage.describe(),
                    resume_page = checkpoint.resume_page,
                    processed_keys = checkpoint.processed_keys.len(),
                    "Loaded checkpoint"
                );
                checkpoint
            }
            Ok(None) => {
                tracing::info!(
                    location = %self.storage.describe(),
                    "No checkpoint found - starting from page 0"
                );
                Checkpoint::new(self.checkpoint_id.clone())
            }
            Err(PagefoldError::Serialization(e)) => {
                tracing::warn!(
                    location = %self.storage.describe(),
                    error = %e,
                    "Checkpoint is corrupt - starting from page 0"
                );
                Checkpoint::new(self.checkpoint_id.clone())
            }
            Err(e) => return Err(e),
        };

        if let Some(window) = self.retention {
            let dropped = checkpoint.processed_keys.compact_before(Utc::now() - window);
            if dropped > 0 {
                tracing::info!(
                    dropped,
                    remaining = checkpoint.processed_keys.len(),
                    retention_days = window.num_days(),
                    "Compacted idempotency ledger"
                );
            }
        }

        Ok(checkpoint)
    }

    /// Persist the checkpoint
    pub async fn save(&self, checkpoint: &Checkpoint, dry_run: bool) -> Result<()> {
        tracing::info!(
            resume_page = checkpoint.resume_page,
            processed_keys = checkpoint.processed_keys.len(),
            dry_run,
            "Saving checkpoint"
        );
        self.storage.save_checkpoint(checkpoint, dry_run).await
    }
}

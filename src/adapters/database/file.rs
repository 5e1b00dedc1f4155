//! JSON file checkpoint storage
//!
//! The checkpoint is written to a sibling temporary file and renamed over the
//! previous one, so a crash mid-write leaves the old checkpoint intact.

use crate::adapters::database::traits::CheckpointStorage;
use crate::core::state::Checkpoint;
use crate::domain::{PagefoldError, Result};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Checkpoint storage in a local JSON file
pub struct FileCheckpointStorage {
    path: PathBuf,
}

impl FileCheckpointStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl CheckpointStorage for FileCheckpointStorage {
    async fn load_checkpoint(&self) -> Result<Option<Checkpoint>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(PagefoldError::State(format!(
                    "Failed to read checkpoint {}: {e}",
                    self.path.display()
                )))
            }
        };

        let checkpoint = serde_json::from_slice(&bytes).map_err(|e| {
            PagefoldError::Serialization(format!(
                "Checkpoint {} is not valid: {e}",
                self.path.display()
            ))
        })?;
        Ok(Some(checkpoint))
    }

    async fn save_checkpoint(&self, checkpoint: &Checkpoint, dry_run: bool) -> Result<()> {
        if dry_run {
            tracing::info!(
                path = %self.path.display(),
                resume_page = checkpoint.resume_page,
                "DRY RUN: Would save checkpoint"
            );
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let json = serde_json::to_vec_pretty(checkpoint)?;
        let tmp = self.temp_path();
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        tracing::debug!(path = %self.path.display(), "Checkpoint written");
        Ok(())
    }

    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }
}

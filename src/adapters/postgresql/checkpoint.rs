//! PostgreSQL checkpoint storage
//!
//! Stores the checkpoint as a JSONB document keyed by checkpoint id.

use crate::adapters::database::traits::CheckpointStorage;
use crate::adapters::postgresql::client::PostgreSQLClient;
use crate::core::state::Checkpoint;
use crate::domain::{PagefoldError, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

/// Checkpoint storage backed by the `pagefold_checkpoints` table
pub struct PostgresCheckpointStorage {
    client: Arc<PostgreSQLClient>,
    checkpoint_id: String,
}

impl PostgresCheckpointStorage {
    pub fn new(client: Arc<PostgreSQLClient>, checkpoint_id: impl Into<String>) -> Self {
        Self {
            client,
            checkpoint_id: checkpoint_id.into(),
        }
    }

    /// Create the checkpoint table if it does not exist
    pub async fn ensure_schema(&self) -> Result<()> {
        let migration_sql = include_str!("../../../migrations/001_checkpoints.sql");
        self.client.batch_execute(migration_sql).await?;
        tracing::debug!("Checkpoint table ready");
        Ok(())
    }
}

#[async_trait]
impl CheckpointStorage for PostgresCheckpointStorage {
    async fn load_checkpoint(&self) -> Result<Option<Checkpoint>> {
        let rows = self
            .client
            .query(
                "SELECT document FROM pagefold_checkpoints WHERE id = $1",
                &[&self.checkpoint_id],
            )
            .await?;

        let Some(row) = rows.first() else {
            return Ok(None);
        };

        let document: serde_json::Value = row
            .try_get(0)
            .map_err(|e| PagefoldError::Serialization(format!("Unreadable checkpoint row: {e}")))?;
        let checkpoint = serde_json::from_value(document)?;
        Ok(Some(checkpoint))
    }

    async fn save_checkpoint(&self, checkpoint: &Checkpoint, dry_run: bool) -> Result<()> {
        if dry_run {
            tracing::info!(
                checkpoint_id = %self.checkpoint_id,
                resume_page = checkpoint.resume_page,
                "DRY RUN: Would save checkpoint to PostgreSQL"
            );
            return Ok(());
        }

        let document = serde_json::to_value(checkpoint)?;
        let resume_page = checkpoint.resume_page as i64;
        let updated_at = checkpoint.updated_at.unwrap_or_else(Utc::now);

        self.client
            .execute(
                r#"
                INSERT INTO pagefold_checkpoints (id, resume_page, document, updated_at)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (id) DO UPDATE SET
                    resume_page = EXCLUDED.resume_page,
                    document = EXCLUDED.document,
                    updated_at = EXCLUDED.updated_at
                "#,
                &[&self.checkpoint_id, &resume_page, &document, &updated_at],
            )
            .await
            .map_err(|e| PagefoldError::State(format!("Failed to save checkpoint: {e}")))?;

        tracing::debug!(checkpoint_id = %self.checkpoint_id, "Checkpoint saved to PostgreSQL");
        Ok(())
    }

    fn describe(&self) -> String {
        format!(
            "postgresql {} (id {})",
            self.client.connection_string_safe(),
            self.checkpoint_id
        )
    }
}

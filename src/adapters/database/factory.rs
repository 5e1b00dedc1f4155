//! Collaborator factory
//!
//! Builds the page fetcher, checkpoint storage and artifact adapters from
//! configuration. The PostgreSQL connection pool is created once and shared
//! by the fetcher and the PostgreSQL checkpoint backend.

use crate::adapters::artifacts::{
    CommandConverter, FormatConverter, HttpDownloader, HttpObjectStorage, ObjectStorageUploader,
};
use crate::adapters::database::file::FileCheckpointStorage;
use crate::adapters::database::traits::CheckpointStorage;
use crate::adapters::postgresql::{PostgreSQLClient, PostgresCheckpointStorage, PostgresPageFetcher};
use crate::config::schema::{CheckpointBackend, PagefoldConfig};
use crate::core::export::Collaborators;
use crate::core::extract::PageFetcher;
use crate::domain::Result;
use std::sync::Arc;

/// Create the shared source connection pool
///
/// # Errors
///
/// Returns an error if the connection string cannot be parsed or the pool
/// cannot be built. No connection is opened here.
pub fn create_source_client(config: &PagefoldConfig) -> Result<Arc<PostgreSQLClient>> {
    Ok(Arc::new(PostgreSQLClient::new(config.source.clone())?))
}

/// Create the page fetcher over an existing pool
pub fn create_page_fetcher(
    config: &PagefoldConfig,
    client: &Arc<PostgreSQLClient>,
) -> Arc<dyn PageFetcher> {
    Arc::new(PostgresPageFetcher::new(
        Arc::clone(client),
        config.source.count_query.clone(),
        config.source.page_query.clone(),
    ))
}

/// Create the checkpoint storage selected by `checkpoint.backend`
///
/// The PostgreSQL backend creates its table if it does not exist yet.
///
/// # Errors
///
/// Returns an error if the checkpoint table cannot be created.
pub async fn create_checkpoint_storage(
    config: &PagefoldConfig,
    client: &Arc<PostgreSQLClient>,
) -> Result<Arc<dyn CheckpointStorage>> {
    match config.checkpoint.backend {
        CheckpointBackend::File => {
            tracing::info!(path = %config.checkpoint.path, "Using file checkpoint storage");
            Ok(Arc::new(FileCheckpointStorage::new(&config.checkpoint.path)))
        }
        CheckpointBackend::PostgreSQL => {
            tracing::info!(
                checkpoint_id = %config.checkpoint.checkpoint_id,
                "Using PostgreSQL checkpoint storage"
            );
            let storage =
                PostgresCheckpointStorage::new(Arc::clone(client), &config.checkpoint.checkpoint_id);
            storage.ensure_schema().await?;
            Ok(Arc::new(storage))
        }
    }
}

/// Build every collaborator the extraction coordinator needs
///
/// # Errors
///
/// Returns an error if any client cannot be built.
pub async fn build_collaborators(config: &PagefoldConfig) -> Result<Collaborators> {
    let client = create_source_client(config)?;
    let fetcher = create_page_fetcher(config, &client);
    let checkpoint_storage = create_checkpoint_storage(config, &client).await?;

    let downloader = Arc::new(HttpDownloader::new(&config.download)?);

    let converter = if config.convert.enabled {
        tracing::info!(program = %config.convert.program, "Artifact conversion enabled");
        Some(Arc::new(CommandConverter::new(&config.convert)) as Arc<dyn FormatConverter>)
    } else {
        None
    };

    let uploader = if config.storage.enabled {
        tracing::info!(bucket = %config.storage.bucket, "Object storage publish enabled");
        Some(Arc::new(HttpObjectStorage::new(&config.storage)?) as Arc<dyn ObjectStorageUploader>)
    } else {
        None
    };

    Ok(Collaborators {
        fetcher,
        downloader,
        converter,
        checkpoint_storage,
        uploader,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use tempfile::TempDir;

    fn config(extra: &str) -> PagefoldConfig {
        parse_config(&format!(
            r#"
[source]
connection_string = "postgresql://reader:pw@localhost:5432/imaging"

{extra}
"#
        ))
        .unwrap()
    }

    #[tokio::test]
    async fn test_file_backend_without_optional_adapters() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cp.json");
        let config = config(&format!(
            "[checkpoint]\nbackend = \"file\"\npath = \"{}\"\n",
            path.display()
        ));

        let collaborators = build_collaborators(&config).await.unwrap();

        assert!(collaborators.converter.is_none());
        assert!(collaborators.uploader.is_none());
        assert!(collaborators.checkpoint_storage.describe().contains("cp.json"));
    }

    #[tokio::test]
    async fn test_optional_adapters_follow_config() {
        let config = config(
            r#"
[convert]
enabled = true
program = "dcm2jpg"

[storage]
enabled = true
bucket = "exports"
"#,
        );

        let collaborators = build_collaborators(&config).await.unwrap();

        assert!(collaborators.converter.is_some());
        assert!(collaborators.uploader.is_some());
    }
}

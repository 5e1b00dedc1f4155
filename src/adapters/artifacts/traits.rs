//! Artifact staging collaborators
//!
//! Download, format conversion and object-storage publish are external
//! concerns; the core only depends on these traits.

use crate::domain::Result;
use async_trait::async_trait;
use std::path::Path;

/// Fetches one binary artifact to a local path
#[async_trait]
pub trait FileDownloader: Send + Sync {
    /// Downloads `url` to `path`, creating parent directories
    ///
    /// Returns the number of bytes written. The file at `path` is only
    /// present once the download completed.
    async fn download(&self, url: &str, path: &Path) -> Result<u64>;
}

/// Converts a staged artifact into another file format
#[async_trait]
pub trait FormatConverter: Send + Sync {
    /// Converts `input` into `output`
    ///
    /// # Errors
    ///
    /// A missing input or a converter failure is a permanent
    /// `ArtifactError`; a timeout is transient.
    async fn convert(&self, input: &Path, output: &Path) -> Result<()>;

    /// Extension of the files this converter produces
    fn target_extension(&self) -> &str;
}

/// Publishes local files to object storage
#[async_trait]
pub trait ObjectStorageUploader: Send + Sync {
    /// Uploads one file to `remote` (object name)
    async fn upload_file(&self, local: &Path, remote: &str) -> Result<()>;

    /// Uploads every file below `local_dir` under `remote_prefix`
    ///
    /// Returns the number of files uploaded. A missing directory uploads
    /// nothing.
    async fn upload_tree(&self, local_dir: &Path, remote_prefix: &str) -> Result<usize>;
}

//! Object storage uploader
//!
//! Publishes files with the JSON API simple media upload
//! (`POST {endpoint}/upload/storage/v1/b/{bucket}/o?uploadType=media&name=...`)
//! authenticated with a bearer token.

use crate::adapters::artifacts::traits::ObjectStorageUploader;
use crate::config::StorageConfig;
use crate::core::retry::RetryPolicy;
use crate::domain::{PagefoldError, Result};
use async_trait::async_trait;
use reqwest::{Client, ClientBuilder, StatusCode};
use secrecy::ExposeSecret;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Uploads files to a storage bucket over HTTP
pub struct HttpObjectStorage {
    client: Client,
    endpoint: String,
    bucket: String,
    access_token: Option<String>,
    retry: RetryPolicy,
}

impl HttpObjectStorage {
    /// Build an uploader from the `[storage]` section
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &StorageConfig) -> Result<Self> {
        let client = ClientBuilder::new()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| PagefoldError::Configuration(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            bucket: config.bucket.clone(),
            access_token: config
                .access_token
                .as_ref()
                .map(|t| t.expose_secret().as_ref().to_string()),
            retry: RetryPolicy::default(),
        })
    }

    /// Replace the retry policy
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn upload_url(&self) -> String {
        format!("{}/upload/storage/v1/b/{}/o", self.endpoint, self.bucket)
    }

    async fn upload_once(&self, body: Vec<u8>, remote: &str, content_type: &str) -> Result<()> {
        let mut request = self
            .client
            .post(self.upload_url())
            .query(&[("uploadType", "media"), ("name", remote)])
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(body);

        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| PagefoldError::Storage(format!("upload of {remote} failed: {e}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        let message = format!("upload of {remote} returned {status}: {body}");
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            Err(PagefoldError::Storage(message))
        } else {
            Err(PagefoldError::Other(message))
        }
    }
}

#[async_trait]
impl ObjectStorageUploader for HttpObjectStorage {
    async fn upload_file(&self, local: &Path, remote: &str) -> Result<()> {
        let body = tokio::fs::read(local).await?;
        let size = body.len();
        let content_type = content_type_for(local);

        self.retry
            .run("upload", || self.upload_once(body.clone(), remote, content_type))
            .await?;

        tracing::debug!(local = %local.display(), remote, bytes = size, "Uploaded file");
        Ok(())
    }

    async fn upload_tree(&self, local_dir: &Path, remote_prefix: &str) -> Result<usize> {
        let files = list_files(local_dir).await?;
        for file in &files {
            let relative = file
                .strip_prefix(local_dir)
                .map_err(|e| PagefoldError::Storage(format!("{}: {e}", file.display())))?;
            let name = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            self.upload_file(file, &object_name(remote_prefix, &name)).await?;
        }

        tracing::info!(
            local = %local_dir.display(),
            prefix = remote_prefix,
            files = files.len(),
            "Uploaded directory"
        );
        Ok(files.len())
    }
}

/// Joins an object prefix and a name with a single slash
pub fn object_name(prefix: &str, name: &str) -> String {
    let prefix = prefix.trim_matches('/');
    let name = name.trim_start_matches('/');
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}/{name}")
    }
}

/// Every regular file below `dir`, sorted; empty when `dir` does not exist
async fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    if !tokio::fs::try_exists(dir).await.unwrap_or(false) {
        return Ok(files);
    }

    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&current).await?;
        while let Some(entry) = entries.next_entry().await? {
            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                pending.push(entry.path());
            } else if file_type.is_file() {
                files.push(entry.path());
            }
        }
    }
    files.sort();
    Ok(files)
}

fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("csv") => "text/csv",
        Some("json") => "application/json",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("dcm") => "application/dicom",
        _ => "application/octet-stream",
    }
}

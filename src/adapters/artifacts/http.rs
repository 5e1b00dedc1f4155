//! HTTP artifact downloader
//!
//! Streams the response body to `{path}.part` and renames it into place once
//! the body is complete. Network failures, timeouts, 429 and 5xx responses
//! are retried with backoff; other error statuses are permanent.

use crate::adapters::artifacts::traits::FileDownloader;
use crate::config::DownloadConfig;
use crate::core::retry::RetryPolicy;
use crate::domain::{ArtifactError, PagefoldError, Result};
use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;

/// Downloads artifacts over HTTP(S)
pub struct HttpDownloader {
    client: Client,
    retry: RetryPolicy,
}

impl HttpDownloader {
    /// Build a downloader from the `[download]` section
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &DownloadConfig) -> Result<Self> {
        let client = ClientBuilder::new()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| PagefoldError::Configuration(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            retry: RetryPolicy::from(&config.retry),
        })
    }

    /// Replace the retry policy
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn download_once(&self, url: &str, path: &Path) -> Result<u64> {
        let mut response = self.client.get(url).send().await.map_err(|e| transport_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ArtifactError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            }
            .into());
        }

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let part = part_path(path);
        let mut file = tokio::fs::File::create(&part).await?;
        let mut written = 0u64;

        while let Some(chunk) = response.chunk().await.map_err(|e| transport_error(url, e))? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&part, path).await?;
        Ok(written)
    }
}

#[async_trait]
impl FileDownloader for HttpDownloader {
    async fn download(&self, url: &str, path: &Path) -> Result<u64> {
        url::Url::parse(url).map_err(|e| ArtifactError::InvalidUrl(format!("{url}: {e}")))?;

        let result = self.retry.run("download", || self.download_once(url, path)).await;
        if result.is_err() {
            let _ = tokio::fs::remove_file(part_path(path)).await;
        }
        result
    }
}

fn part_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".part");
    path.with_file_name(name)
}

fn transport_error(url: &str, e: reqwest::Error) -> PagefoldError {
    if e.is_timeout() {
        ArtifactError::Timeout(format!("{url}: {e}")).into()
    } else {
        ArtifactError::DownloadFailed {
            url: url.to_string(),
            message: e.to_string(),
        }
        .into()
    }
}

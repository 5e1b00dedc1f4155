//! In-memory collaborators and fixtures shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use pagefold::adapters::artifacts::{FileDownloader, FormatConverter};
use pagefold::adapters::database::{CheckpointStorage, FileCheckpointStorage};
use pagefold::config::{parse_config, PagefoldConfig};
use pagefold::core::export::{Collaborators, ExtractionCoordinator};
use pagefold::core::extract::{FetchedPage, Page, PageFetcher};
use pagefold::domain::{GroupId, ItemId, ParentId, Result, SourceError, SourceRow};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::watch;

/// Serves pages out of a vector of rows
pub struct MemoryFetcher {
    rows: Vec<SourceRow>,
    failing_pages: HashSet<u64>,
    bad_row_pages: HashSet<u64>,
    slow_pages: HashMap<u64, Duration>,
    fetched: Mutex<Vec<u64>>,
}

impl MemoryFetcher {
    pub fn new(rows: Vec<SourceRow>) -> Self {
        Self {
            rows,
            failing_pages: HashSet::new(),
            bad_row_pages: HashSet::new(),
            slow_pages: HashMap::new(),
            fetched: Mutex::new(Vec::new()),
        }
    }

    /// Page fails with a permanent error every time it is fetched
    pub fn failing(mut self, page: u64) -> Self {
        self.failing_pages.insert(page);
        self
    }

    /// Page carries one extra row that cannot be decoded
    pub fn with_bad_row(mut self, page: u64) -> Self {
        self.bad_row_pages.insert(page);
        self
    }

    /// Page sleeps before returning
    pub fn slow(mut self, page: u64, delay: Duration) -> Self {
        self.slow_pages.insert(page, delay);
        self
    }

    /// Page indexes fetched so far, sorted
    pub fn fetched_pages(&self) -> Vec<u64> {
        let mut pages = self.fetched.lock().unwrap().clone();
        pages.sort_unstable();
        pages
    }
}

#[async_trait]
impl PageFetcher for MemoryFetcher {
    async fn count(&self) -> Result<u64> {
        Ok(self.rows.len() as u64)
    }

    async fn fetch_page(&self, page: Page) -> Result<FetchedPage> {
        self.fetched.lock().unwrap().push(page.index);

        if let Some(delay) = self.slow_pages.get(&page.index) {
            tokio::time::sleep(*delay).await;
        }
        if self.failing_pages.contains(&page.index) {
            return Err(SourceError::InvalidRow(format!("page {} is unreadable", page.index)).into());
        }

        let start = page.offset() as usize;
        let end = (start + page.limit() as usize).min(self.rows.len());
        let rows = self.rows.get(start..end).map(<[SourceRow]>::to_vec).unwrap_or_default();
        if !self.bad_row_pages.contains(&page.index) {
            return Ok(rows.into());
        }

        let mut results: Vec<Result<SourceRow>> = rows.into_iter().map(Ok).collect();
        results.push(Err(SourceError::InvalidRow("column item_id is NULL".to_string()).into()));
        Ok(FetchedPage::from_results(page, results))
    }
}

/// Writes the URL as the file body
#[derive(Default)]
pub struct MemoryDownloader {
    pub downloads: Mutex<Vec<String>>,
}

#[async_trait]
impl FileDownloader for MemoryDownloader {
    async fn download(&self, url: &str, path: &Path) -> Result<u64> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, url.as_bytes()).await?;
        self.downloads.lock().unwrap().push(url.to_string());
        Ok(url.len() as u64)
    }
}

/// Copies the input to the output
pub struct CopyConverter;

#[async_trait]
impl FormatConverter for CopyConverter {
    async fn convert(&self, input: &Path, output: &Path) -> Result<()> {
        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(input, output).await?;
        Ok(())
    }

    fn target_extension(&self) -> &str {
        "jpg"
    }
}

pub fn ts(minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 9, minute, 0).unwrap()
}

/// One row of artifact `item` under `parent`
pub fn row(parent: &str, item: &str, item_number: i32, text: Option<&str>, minute: u32) -> SourceRow {
    SourceRow {
        parent_id: ParentId::new(parent).unwrap(),
        group_id: GroupId::new(format!("{parent}-G1")).unwrap(),
        item_id: ItemId::new(item).unwrap(),
        artifact_path: Some(format!("{parent}/{item}.dcm")),
        artifact_url: Some(format!("https://files.example.com/{parent}/{item}.dcm")),
        text_value: text.map(str::to_string),
        text_created_at: Some(ts(minute)),
        group_number: Some(1),
        item_number: Some(item_number),
    }
}

/// 23 rows forming 5 artifact keys across 2 parents
///
/// With `page_size = 10` and `batch_size = 5` every key lands in exactly one
/// batch: pages hold I1+I2, I3+I4 and I5.
pub fn scenario_rows() -> Vec<SourceRow> {
    let mut rows = Vec::new();
    let p1_texts = [Some("CT chest"), Some("follow-up"), None, Some("CT chest"), Some("follow-up")];
    for (n, item) in ["I1", "I2", "I3"].iter().enumerate() {
        for (i, text) in p1_texts.iter().enumerate() {
            rows.push(row("P1", item, n as i32 + 1, *text, (n * 5 + i) as u32));
        }
    }
    let p2_texts = [Some("MRI knee"), None, Some("normal"), Some("MRI knee"), Some("normal")];
    for (i, text) in p2_texts.iter().enumerate() {
        rows.push(row("P2", "I4", 1, *text, 20 + i as u32));
    }
    let p2_tail = [Some("MRI knee"), Some("normal"), None];
    for (i, text) in p2_tail.iter().enumerate() {
        rows.push(row("P2", "I5", 2, *text, 30 + i as u32));
    }
    rows
}

/// Canonical key of artifact `item` under `parent`
pub fn key(parent: &str, item: &str) -> String {
    row(parent, item, 1, None, 0).key().canonical()
}

/// Test workspace: temporary output and checkpoint locations
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn output_dir(&self) -> PathBuf {
        self.dir.path().join("output")
    }

    pub fn table_path(&self) -> PathBuf {
        self.output_dir().join("extraction.csv")
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        self.dir.path().join("state").join("checkpoint.json")
    }

    pub fn checkpoint_storage(&self) -> Arc<FileCheckpointStorage> {
        Arc::new(FileCheckpointStorage::new(self.checkpoint_path()))
    }

    /// Configuration with fast retries; `extra` is appended verbatim
    pub fn config(&self, extra: &str) -> PagefoldConfig {
        parse_config(&format!(
            r#"
[source]
connection_string = "postgresql://reader:pw@localhost:5432/imaging"

[extraction]
page_size = 10
batch_size = 5

[dispatch]
max_concurrent_units = 4
fan_in_timeout_seconds = 30

[dispatch.retry]
max_retries = 1
initial_delay_ms = 1
max_delay_ms = 1
backoff_multiplier = 1.0

[output]
directory = "{output}"

[checkpoint]
path = "{checkpoint}"

{extra}
"#,
            output = self.output_dir().display(),
            checkpoint = self.checkpoint_path().display(),
        ))
        .unwrap()
    }

    pub fn coordinator(
        &self,
        config: &PagefoldConfig,
        fetcher: Arc<MemoryFetcher>,
        shutdown: watch::Receiver<bool>,
    ) -> ExtractionCoordinator {
        let collaborators = Collaborators {
            fetcher,
            downloader: Arc::new(MemoryDownloader::default()),
            converter: Some(Arc::new(CopyConverter)),
            checkpoint_storage: self.checkpoint_storage() as Arc<dyn CheckpointStorage>,
            uploader: None,
        };
        ExtractionCoordinator::new(config, collaborators, shutdown)
    }

    /// Rows of the output table as field maps
    pub fn table_rows(&self) -> Vec<HashMap<String, String>> {
        let mut reader = csv::Reader::from_path(self.table_path()).unwrap();
        reader.deserialize().map(|r| r.unwrap()).collect()
    }
}

/// A receiver whose sender stays alive for the test
pub fn no_shutdown() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}

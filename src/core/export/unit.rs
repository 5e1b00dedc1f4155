//! Page-scoped unit of work
//!
//! A [`UnitOfWork`] owns one page. It fetches the page, splits it into
//! batches and runs them one after another through the record folder, then
//! stages the artifacts of the emitted rows. It never waits on other units.

use crate::adapters::artifacts::{FileDownloader, FormatConverter};
use crate::core::extract::{BatchSplitter, Page, PageFetcher};
use crate::core::state::{IdempotencyLedger, RunningKeys};
use crate::core::transform::{file_stem, RecordFolder, CONVERTED_DIR};
use crate::domain::{OutputRow, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Collaborators shared by every unit of a run
pub struct UnitContext {
    pub fetcher: Arc<dyn PageFetcher>,
    pub downloader: Arc<dyn FileDownloader>,
    /// Set when conversion is enabled
    pub converter: Option<Arc<dyn FormatConverter>>,
    pub folder: RecordFolder,
    pub splitter: BatchSplitter,
    /// Skip downloads and conversion
    pub dry_run: bool,
}

/// Outcome of one unit, as observed by the coordinator
#[derive(Debug, Clone, Default)]
pub struct UnitResult {
    pub success: bool,
    pub page: u64,
    pub records_processed: usize,
    pub artifacts_found: usize,
    pub rows_produced: usize,
    pub downloaded_count: usize,
    pub converted_count: usize,
    /// Keys first emitted by this unit, in first-seen order
    pub new_keys: Vec<String>,
    pub rows: Vec<OutputRow>,
    /// Non-fatal per-item errors, or the page error when `success` is false
    pub errors: Vec<String>,
    /// Attempts made, including retries
    pub attempts: usize,
    pub duration: Duration,
}

impl UnitResult {
    pub fn new(page: u64) -> Self {
        Self {
            success: true,
            page,
            attempts: 1,
            ..Self::default()
        }
    }

    /// A unit whose page could not be processed
    pub fn failed(page: u64, error: impl Into<String>, attempts: usize) -> Self {
        Self {
            success: false,
            page,
            errors: vec![error.into()],
            attempts,
            ..Self::default()
        }
    }
}

/// One page of work, with the ledger snapshot taken at dispatch time
#[derive(Clone)]
pub struct UnitOfWork {
    page: Page,
    snapshot: Arc<IdempotencyLedger>,
    ctx: Arc<UnitContext>,
}

impl UnitOfWork {
    pub fn new(page: Page, snapshot: Arc<IdempotencyLedger>, ctx: Arc<UnitContext>) -> Self {
        Self {
            page,
            snapshot,
            ctx,
        }
    }

    pub fn page(&self) -> Page {
        self.page
    }

    /// Processes the page
    ///
    /// Per-item download and conversion failures are recorded in the
    /// result and never fail the unit.
    ///
    /// # Errors
    ///
    /// Returns the fetch error when the page itself cannot be read; the
    /// scheduler decides whether to retry.
    pub async fn run(&self) -> Result<UnitResult> {
        let page = self.page.index;
        let fetched = self.ctx.fetcher.fetch_page(self.page).await?;
        let rows = fetched.rows;

        let mut result = UnitResult::new(page);
        result.records_processed = rows.len();
        result.errors.extend(fetched.rejected);

        let batches = self.ctx.splitter.split(rows);
        let batch_count = batches.len();
        let mut running = RunningKeys::new(&self.snapshot);

        for (batch_index, batch) in batches.into_iter().enumerate() {
            let folded = self.ctx.folder.fold(&batch, &running);
            let emitted = self.ctx.folder.emit_rows(&folded, &running);

            tracing::debug!(
                page,
                batch = batch_index,
                batches = batch_count,
                rows = batch.len(),
                new_keys = folded.new_keys.len(),
                skipped = folded.skipped_rows,
                "Folded batch"
            );

            result.artifacts_found += folded.artifacts.len();
            running.record(folded.new_keys.iter().cloned());
            result.new_keys.extend(folded.new_keys);

            for mut row in emitted {
                self.stage(&mut row, &mut result).await;
                result.rows.push(row);
            }
        }

        result.rows_produced = result.rows.len();
        Ok(result)
    }

    async fn stage(&self, row: &mut OutputRow, result: &mut UnitResult) {
        let (Some(url), Some(local)) = (row.artifact_url.clone(), row.local_path.clone()) else {
            return;
        };
        if self.ctx.dry_run {
            return;
        }

        let local = PathBuf::from(local);
        match self.ctx.downloader.download(&url, &local).await {
            Ok(bytes) => {
                row.downloaded = true;
                result.downloaded_count += 1;
                tracing::debug!(page = self.page.index, item_id = %row.item_id, bytes, "Downloaded artifact");
            }
            Err(e) => {
                tracing::warn!(page = self.page.index, item_id = %row.item_id, error = %e, "Download failed, skipping item");
                result.errors.push(format!("item {}: {e}", row.item_id));
                return;
            }
        }

        let Some(converter) = &self.ctx.converter else {
            return;
        };
        let target = converted_path(
            self.ctx.folder.output_dir(),
            &row.item_id,
            converter.target_extension(),
        );
        match converter.convert(&local, &target).await {
            Ok(()) => {
                row.converted = true;
                row.converted_path = Some(target.to_string_lossy().into_owned());
                result.converted_count += 1;
            }
            Err(e) => {
                tracing::warn!(page = self.page.index, item_id = %row.item_id, error = %e, "Conversion failed, skipping item");
                result.errors.push(format!("item {}: {e}", row.item_id));
            }
        }
    }
}

/// Deterministic path of an item's converted artifact
pub fn converted_path(output_dir: &Path, item_id: &str, extension: &str) -> PathBuf {
    output_dir
        .join(CONVERTED_DIR)
        .join(format!("{}.{extension}", file_stem(item_id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::extract::FetchedPage;
    use crate::domain::{ArtifactError, GroupId, ItemId, ParentId, SourceError, SourceRow};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct OnePage(Vec<SourceRow>);

    #[async_trait]
    impl PageFetcher for OnePage {
        async fn count(&self) -> Result<u64> {
            Ok(self.0.len() as u64)
        }

        async fn fetch_page(&self, _page: Page) -> Result<FetchedPage> {
            Ok(self.0.clone().into())
        }
    }

    struct Unreachable;

    #[async_trait]
    impl PageFetcher for Unreachable {
        async fn count(&self) -> Result<u64> {
            Ok(0)
        }

        async fn fetch_page(&self, _page: Page) -> Result<FetchedPage> {
            Err(SourceError::ConnectionFailed("refused".to_string()).into())
        }
    }

    #[derive(Default)]
    struct RecordingDownloader {
        urls: Mutex<Vec<String>>,
        fail_on: Option<String>,
    }

    #[async_trait]
    impl FileDownloader for RecordingDownloader {
        async fn download(&self, url: &str, _path: &Path) -> Result<u64> {
            if self.fail_on.as_deref() == Some(url) {
                return Err(ArtifactError::HttpStatus {
                    url: url.to_string(),
                    status: 404,
                }
                .into());
            }
            self.urls.lock().unwrap().push(url.to_string());
            Ok(3)
        }
    }

    struct NoopConverter;

    #[async_trait]
    impl FormatConverter for NoopConverter {
        async fn convert(&self, _input: &Path, _output: &Path) -> Result<()> {
            Ok(())
        }

        fn target_extension(&self) -> &str {
            "jpg"
        }
    }

    fn row(parent: &str, item: &str, text: &str) -> SourceRow {
        SourceRow {
            parent_id: ParentId::new(parent).unwrap(),
            group_id: GroupId::new("G1").unwrap(),
            item_id: ItemId::new(item).unwrap(),
            artifact_path: Some(format!("{item}.dcm")),
            artifact_url: Some(format!("https://files.example.com/{item}")),
            text_value: Some(text.to_string()),
            text_created_at: None,
            group_number: Some(1),
            item_number: Some(1),
        }
    }

    fn context(
        fetcher: Arc<dyn PageFetcher>,
        downloader: Arc<RecordingDownloader>,
        converter: Option<Arc<dyn FormatConverter>>,
        dry_run: bool,
    ) -> Arc<UnitContext> {
        Arc::new(UnitContext {
            fetcher,
            downloader,
            converter,
            folder: RecordFolder::new("/out", "dcm"),
            splitter: BatchSplitter::new(2),
            dry_run,
        })
    }

    fn unit(ctx: Arc<UnitContext>, snapshot: IdempotencyLedger) -> UnitOfWork {
        UnitOfWork::new(Page::new(0, 10), Arc::new(snapshot), ctx)
    }

    #[tokio::test]
    async fn test_key_spanning_batches_is_emitted_once() {
        // I1 straddles the boundary between batch 0 and batch 1
        let rows = vec![
            row("P1", "I0", "A"),
            row("P1", "I1", "A"),
            row("P1", "I1", "B"),
        ];
        let downloader = Arc::new(RecordingDownloader::default());
        let ctx = context(Arc::new(OnePage(rows)), downloader.clone(), None, false);

        let result = unit(ctx, IdempotencyLedger::new()).run().await.unwrap();

        assert_eq!(result.records_processed, 3);
        assert_eq!(result.new_keys.len(), 2);
        assert_eq!(result.rows_produced, 2);
        assert_eq!(downloader.urls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_snapshot_keys_are_skipped() {
        let rows = vec![row("P1", "I1", "A"), row("P1", "I2", "B")];
        let mut snapshot = IdempotencyLedger::new();
        snapshot.insert(rows[0].key().canonical(), chrono::Utc::now());
        let ctx = context(
            Arc::new(OnePage(rows)),
            Arc::new(RecordingDownloader::default()),
            None,
            false,
        );

        let result = unit(ctx, snapshot).run().await.unwrap();

        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.rows[0].item_id, "I2");
    }

    #[tokio::test]
    async fn test_failed_download_is_recorded_not_fatal() {
        let rows = vec![row("P1", "I1", "A"), row("P1", "I2", "A")];
        let downloader = Arc::new(RecordingDownloader {
            fail_on: Some("https://files.example.com/I1".to_string()),
            ..Default::default()
        });
        let ctx = context(
            Arc::new(OnePage(rows)),
            downloader,
            Some(Arc::new(NoopConverter)),
            false,
        );

        let result = unit(ctx, IdempotencyLedger::new()).run().await.unwrap();

        assert!(result.success);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.downloaded_count, 1);
        assert_eq!(result.converted_count, 1);
        assert!(!result.rows[0].downloaded);
        assert!(result.rows[1].converted);
        assert_eq!(
            result.rows[1].converted_path.as_deref(),
            Some("/out/converted/I2.jpg")
        );
        assert_eq!(result.new_keys.len(), 2);
    }

    #[tokio::test]
    async fn test_dry_run_skips_staging() {
        let downloader = Arc::new(RecordingDownloader::default());
        let ctx = context(
            Arc::new(OnePage(vec![row("P1", "I1", "A")])),
            downloader.clone(),
            None,
            true,
        );

        let result = unit(ctx, IdempotencyLedger::new()).run().await.unwrap();

        assert_eq!(result.rows_produced, 1);
        assert_eq!(result.downloaded_count, 0);
        assert!(downloader.urls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_error_fails_the_unit() {
        let ctx = context(
            Arc::new(Unreachable),
            Arc::new(RecordingDownloader::default()),
            None,
            false,
        );
        let err = unit(ctx, IdempotencyLedger::new()).run().await.unwrap_err();
        assert!(err.is_transient());
    }

    struct OneBadRow(Vec<SourceRow>);

    #[async_trait]
    impl PageFetcher for OneBadRow {
        async fn count(&self) -> Result<u64> {
            Ok(self.0.len() as u64 + 1)
        }

        async fn fetch_page(&self, page: Page) -> Result<FetchedPage> {
            let mut results: Vec<Result<SourceRow>> = self.0.iter().cloned().map(Ok).collect();
            results.insert(
                1,
                Err(SourceError::InvalidRow("column parent_id is NULL".to_string()).into()),
            );
            Ok(FetchedPage::from_results(page, results))
        }
    }

    #[tokio::test]
    async fn test_undecodable_row_does_not_fail_the_page() {
        let rows = vec![row("P1", "I1", "A"), row("P1", "I2", "B")];
        let ctx = context(
            Arc::new(OneBadRow(rows)),
            Arc::new(RecordingDownloader::default()),
            None,
            false,
        );

        let result = unit(ctx, IdempotencyLedger::new()).run().await.unwrap();

        assert!(result.success);
        assert_eq!(result.records_processed, 2);
        assert_eq!(result.rows_produced, 2);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("parent_id is NULL"));
    }

    #[test]
    fn test_failed_result() {
        let result = UnitResult::failed(4, "boom", 3);
        assert!(!result.success);
        assert_eq!(result.page, 4);
        assert_eq!(result.attempts, 3);
        assert_eq!(result.errors, vec!["boom".to_string()]);
    }
}

//! Extraction coordinator - dispatch and fan-in for one run
//!
//! The coordinator loads the checkpoint, counts the source, submits one
//! [`UnitOfWork`] per remaining page, waits once for all of them, merges the
//! succeeded units into the ledger and the output table, and persists the
//! checkpoint. It is the only writer of checkpoint state.

use crate::adapters::artifacts::{object_name, FileDownloader, FormatConverter, ObjectStorageUploader};
use crate::adapters::database::traits::CheckpointStorage;
use crate::config::PagefoldConfig;
use crate::core::export::scheduler::{TaskScheduler, TokioScheduler};
use crate::core::export::summary::{RunOutcome, RunSummary};
use crate::core::export::unit::{UnitContext, UnitOfWork};
use crate::core::extract::{total_pages, BatchSplitter, Page, PageFetcher};
use crate::core::output::OutputWriter;
use crate::core::retry::RetryPolicy;
use crate::core::state::{contiguous_resume_page, CheckpointStore};
use crate::core::transform::{RecordFolder, ARTIFACTS_DIR, CONVERTED_DIR};
use crate::domain::{PagefoldError, Result};
use chrono::Utc;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use uuid::Uuid;

/// Run-level dispatch settings
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub page_size: usize,
    pub batch_size: usize,
    pub max_concurrent_units: usize,
    /// Upper bound on the single fan-in wait
    pub fan_in_timeout: Duration,
    /// Retry policy for whole-page failures
    pub retry: RetryPolicy,
    pub dry_run: bool,
}

impl DispatchSettings {
    pub fn from_config(config: &PagefoldConfig) -> Self {
        Self {
            page_size: config.extraction.page_size,
            batch_size: config.extraction.batch_size,
            max_concurrent_units: config.dispatch.max_concurrent_units,
            fan_in_timeout: Duration::from_secs(config.dispatch.fan_in_timeout_seconds),
            retry: RetryPolicy::from(&config.dispatch.retry),
            dry_run: config.application.dry_run,
        }
    }
}

/// External collaborators of a run
pub struct Collaborators {
    pub fetcher: Arc<dyn PageFetcher>,
    pub downloader: Arc<dyn FileDownloader>,
    pub converter: Option<Arc<dyn FormatConverter>>,
    pub checkpoint_storage: Arc<dyn CheckpointStorage>,
    pub uploader: Option<Arc<dyn ObjectStorageUploader>>,
}

struct PublishTarget {
    uploader: Arc<dyn ObjectStorageUploader>,
    table_prefix: String,
    artifacts_prefix: String,
    converted_prefix: String,
}

/// Extraction coordinator
pub struct ExtractionCoordinator {
    settings: DispatchSettings,
    fetcher: Arc<dyn PageFetcher>,
    checkpoints: CheckpointStore,
    unit_context: Arc<UnitContext>,
    output_dir: PathBuf,
    writer: OutputWriter,
    publish: Option<PublishTarget>,
    scheduler: Arc<dyn TaskScheduler>,
    shutdown: watch::Receiver<bool>,
}

impl ExtractionCoordinator {
    /// Create a coordinator from configuration and collaborators
    pub fn new(
        config: &PagefoldConfig,
        collaborators: Collaborators,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let settings = DispatchSettings::from_config(config);
        let output_dir = PathBuf::from(&config.output.directory);

        let unit_context = Arc::new(UnitContext {
            fetcher: collaborators.fetcher.clone(),
            downloader: collaborators.downloader,
            converter: collaborators.converter,
            folder: RecordFolder::new(output_dir.clone(), config.download.artifact_extension.clone()),
            splitter: BatchSplitter::new(settings.batch_size),
            dry_run: settings.dry_run,
        });

        let checkpoints = CheckpointStore::new_with_storage(
            collaborators.checkpoint_storage,
            &config.checkpoint.checkpoint_id,
        )
        .with_retention_days(config.checkpoint.ledger_retention_days);

        let mut writer = OutputWriter::new(
            output_dir.join(&config.output.table_file_name),
            config.output.append_existing,
        );
        if settings.dry_run {
            writer = writer.for_dry_run();
        }

        let publish = collaborators.uploader.map(|uploader| PublishTarget {
            uploader,
            table_prefix: config.storage.table_prefix.clone(),
            artifacts_prefix: config.storage.artifacts_prefix.clone(),
            converted_prefix: config.storage.converted_prefix.clone(),
        });

        let scheduler = Arc::new(TokioScheduler::new(
            settings.max_concurrent_units,
            settings.retry.clone(),
        ));

        Self {
            settings,
            fetcher: collaborators.fetcher,
            checkpoints,
            unit_context,
            output_dir,
            writer,
            publish,
            scheduler,
            shutdown,
        }
    }

    /// Replace the default tokio scheduler
    pub fn with_scheduler(mut self, scheduler: Arc<dyn TaskScheduler>) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    /// Execute one extraction run
    ///
    /// A fan-in timeout or a shutdown signal ends the run without merging
    /// any unit and without touching the checkpoint; the returned summary
    /// carries the outcome.
    ///
    /// # Errors
    ///
    /// Checkpoint storage, source count and output write failures are
    /// returned as errors.
    pub async fn run(&self) -> Result<RunSummary> {
        let started = Instant::now();
        let run_id = Uuid::new_v4().to_string();
        let dry_run = self.settings.dry_run;
        let mut summary = RunSummary::new(run_id.clone(), dry_run);

        tracing::info!(
            run_id = %run_id,
            page_size = self.settings.page_size,
            batch_size = self.settings.batch_size,
            max_concurrent_units = self.settings.max_concurrent_units,
            dry_run,
            checkpoint = %self.checkpoints.describe(),
            "Starting extraction run"
        );

        let mut checkpoint = self.checkpoints.load().await?;
        summary.start_page = checkpoint.resume_page;

        let count_started = Instant::now();
        let total_rows = self.fetcher.count().await?;
        let total = total_pages(total_rows, self.settings.page_size);
        summary.timings.count = count_started.elapsed();
        summary.total_rows = total_rows;
        summary.total_pages = total;

        if checkpoint.resume_page >= total {
            tracing::info!(
                resume_page = checkpoint.resume_page,
                total_pages = total,
                "No pages left to extract"
            );
            summary.resume_page = checkpoint.resume_page;
            summary.ledger_size = checkpoint.processed_keys.len();
            return Ok(self.finish(summary, started));
        }

        // Units fold against the ledger as it stood at dispatch time
        let snapshot = Arc::new(checkpoint.processed_keys.clone());
        let handles: Vec<_> = (checkpoint.resume_page..total)
            .map(|index| {
                let page = Page::new(index, self.settings.page_size);
                self.scheduler.submit(UnitOfWork::new(
                    page,
                    snapshot.clone(),
                    self.unit_context.clone(),
                ))
            })
            .collect();
        summary.pages_dispatched = handles.len();

        tracing::info!(
            from_page = checkpoint.resume_page,
            to_page = total,
            units = handles.len(),
            "Dispatched page units"
        );

        let extraction_started = Instant::now();
        let mut shutdown = self.shutdown.clone();
        let waited = tokio::select! {
            results = self.scheduler.wait(handles, self.settings.fan_in_timeout) => results,
            _ = shutdown_requested(&mut shutdown) => Err(PagefoldError::Interrupted(
                "shutdown signal received during fan-in".to_string(),
            )),
        };
        summary.timings.extraction = extraction_started.elapsed();
        summary.page_states = self.scheduler.page_states();

        let results = match waited {
            Ok(results) => results,
            Err(e @ PagefoldError::FanInTimeout { .. }) => {
                return Ok(self.abandon(summary, RunOutcome::TimedOut, e, &checkpoint, started));
            }
            Err(e @ PagefoldError::Interrupted(_)) => {
                return Ok(self.abandon(summary, RunOutcome::Interrupted, e, &checkpoint, started));
            }
            Err(e) => return Err(e),
        };

        // Merge in completion order
        let emitted_at = Utc::now();
        let mut succeeded = BTreeSet::new();
        let mut rows = Vec::new();
        for result in results {
            summary.record_unit(&result);
            if result.success {
                succeeded.insert(result.page);
                summary.new_keys += checkpoint.merge_keys(result.new_keys, emitted_at);
                rows.extend(result.rows);
            }
        }

        let resume = contiguous_resume_page(checkpoint.resume_page, total, |page| {
            succeeded.contains(&page)
        });
        checkpoint.advance_to(resume);
        checkpoint.total_pages = Some(total);
        checkpoint.touch(&run_id);

        if summary.pages_failed > 0 {
            summary.outcome = RunOutcome::Partial;
            tracing::warn!(
                failed = summary.pages_failed,
                resume_page = checkpoint.resume_page,
                "Some pages failed; checkpoint stops at the first failed page"
            );
        }

        // Keys are persisted before their rows are written
        self.checkpoints.save(&checkpoint, dry_run).await?;
        summary.resume_page = checkpoint.resume_page;
        summary.ledger_size = checkpoint.processed_keys.len();

        let output_started = Instant::now();
        if let Some(report) = self.writer.write(&rows)? {
            summary.table_path = Some(report.path);
            summary.table_checksum = Some(report.checksum);
        }
        summary.timings.output = output_started.elapsed();

        if dry_run {
            tracing::info!("Dry run - skipping publish");
        } else if let Some(target) = &self.publish {
            let upload_started = Instant::now();
            self.publish_outputs(target, &mut summary).await;
            summary.timings.upload = upload_started.elapsed();
        }

        Ok(self.finish(summary, started))
    }

    fn abandon(
        &self,
        mut summary: RunSummary,
        outcome: RunOutcome,
        error: PagefoldError,
        checkpoint: &crate::core::state::Checkpoint,
        started: Instant,
    ) -> RunSummary {
        tracing::error!(error = %error, "Fan-in abandoned; checkpoint not advanced");
        summary.outcome = outcome;
        summary.add_error(error.to_string());
        summary.resume_page = checkpoint.resume_page;
        summary.ledger_size = checkpoint.processed_keys.len();
        self.finish(summary, started)
    }

    fn finish(&self, summary: RunSummary, started: Instant) -> RunSummary {
        let summary = summary.with_duration(started.elapsed());
        summary.log_summary();
        summary
    }

    /// Upload the table and the staged artifact trees
    ///
    /// Failures are recorded in the summary and do not fail the run.
    async fn publish_outputs(&self, target: &PublishTarget, summary: &mut RunSummary) {
        if let Some(table) = summary.table_path.clone() {
            let name = table
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let remote = object_name(&target.table_prefix, &name);
            match target.uploader.upload_file(&table, &remote).await {
                Ok(()) => summary.uploaded += 1,
                Err(e) => {
                    tracing::error!(error = %e, remote = %remote, "Table upload failed");
                    summary.add_error(format!("upload {remote}: {e}"));
                }
            }
        }

        for (dir, prefix) in [
            (ARTIFACTS_DIR, &target.artifacts_prefix),
            (CONVERTED_DIR, &target.converted_prefix),
        ] {
            let local = self.output_dir.join(dir);
            match target.uploader.upload_tree(&local, prefix).await {
                Ok(count) => summary.uploaded += count,
                Err(e) => {
                    tracing::error!(error = %e, local = %local.display(), "Tree upload failed");
                    summary.add_error(format!("upload {}: {e}", local.display()));
                }
            }
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

/// Resolves once a shutdown has been signalled; never resolves if the sender is gone
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

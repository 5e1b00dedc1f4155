//! Run summary and reporting
//!
//! This module defines structures for tracking and reporting the outcome of
//! one extraction run.

use crate::core::export::scheduler::PageState;
use crate::core::export::unit::UnitResult;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Maximum number of error strings kept in a summary
pub const MAX_ERROR_SAMPLES: usize = 20;

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every dispatched page succeeded
    Completed,
    /// Some pages failed; the checkpoint stops at the first failed page
    Partial,
    /// The fan-in deadline passed; nothing was merged
    TimedOut,
    /// A shutdown signal arrived during fan-in; nothing was merged
    Interrupted,
}

/// Wall-clock time spent in each phase
#[derive(Debug, Clone, Default, Serialize)]
pub struct PhaseTimings {
    pub count: Duration,
    pub extraction: Duration,
    pub output: Duration,
    pub upload: Duration,
}

/// Summary of an extraction run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub outcome: RunOutcome,
    pub dry_run: bool,

    /// Rows reported by the source count
    pub total_rows: u64,
    pub total_pages: u64,
    /// Page the run started from
    pub start_page: u64,
    /// Page the next run will start from
    pub resume_page: u64,

    pub pages_dispatched: usize,
    pub pages_succeeded: usize,
    pub pages_failed: usize,

    pub records_processed: usize,
    pub artifacts_found: usize,
    pub rows_produced: usize,
    pub downloaded: usize,
    pub converted: usize,
    /// Files published to object storage
    pub uploaded: usize,

    /// Keys added to the ledger by this run
    pub new_keys: usize,
    /// Ledger size after this run
    pub ledger_size: usize,

    pub table_path: Option<PathBuf>,
    pub table_checksum: Option<String>,

    /// Total errors seen, including those not kept as samples
    pub error_count: usize,
    /// First [`MAX_ERROR_SAMPLES`] error strings
    pub errors: Vec<String>,

    pub page_states: BTreeMap<u64, PageState>,
    pub timings: PhaseTimings,
    pub duration: Duration,
}

impl RunSummary {
    pub fn new(run_id: impl Into<String>, dry_run: bool) -> Self {
        Self {
            run_id: run_id.into(),
            outcome: RunOutcome::Completed,
            dry_run,
            total_rows: 0,
            total_pages: 0,
            start_page: 0,
            resume_page: 0,
            pages_dispatched: 0,
            pages_succeeded: 0,
            pages_failed: 0,
            records_processed: 0,
            artifacts_found: 0,
            rows_produced: 0,
            downloaded: 0,
            converted: 0,
            uploaded: 0,
            new_keys: 0,
            ledger_size: 0,
            table_path: None,
            table_checksum: None,
            error_count: 0,
            errors: Vec::new(),
            page_states: BTreeMap::new(),
            timings: PhaseTimings::default(),
            duration: Duration::ZERO,
        }
    }

    /// Set the duration
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Record an error, keeping only a bounded sample of messages
    pub fn add_error(&mut self, error: impl Into<String>) {
        self.error_count += 1;
        if self.errors.len() < MAX_ERROR_SAMPLES {
            self.errors.push(error.into());
        }
    }

    /// Fold one observed unit result into the totals
    pub fn record_unit(&mut self, result: &UnitResult) {
        if result.success {
            self.pages_succeeded += 1;
            self.records_processed += result.records_processed;
            self.artifacts_found += result.artifacts_found;
            self.rows_produced += result.rows_produced;
            self.downloaded += result.downloaded_count;
            self.converted += result.converted_count;
        } else {
            self.pages_failed += 1;
        }
        for error in &result.errors {
            self.add_error(error.clone());
        }
    }

    /// Whether every dispatched page succeeded and nothing was abandoned
    pub fn is_successful(&self) -> bool {
        self.outcome == RunOutcome::Completed && self.pages_failed == 0
    }

    /// Process exit code for this outcome
    ///
    /// `0` completed, `1` partial, `4` fan-in timeout, `130` interrupted.
    pub fn exit_code(&self) -> i32 {
        match self.outcome {
            RunOutcome::Completed => 0,
            RunOutcome::Partial => 1,
            RunOutcome::TimedOut => 4,
            RunOutcome::Interrupted => 130,
        }
    }

    /// Get page success rate as a percentage
    pub fn success_rate(&self) -> f64 {
        if self.pages_dispatched == 0 {
            return 100.0;
        }
        (self.pages_succeeded as f64 / self.pages_dispatched as f64) * 100.0
    }

    /// Log the summary
    pub fn log_summary(&self) {
        tracing::info!(
            run_id = %self.run_id,
            outcome = ?self.outcome,
            dry_run = self.dry_run,
            total_rows = self.total_rows,
            total_pages = self.total_pages,
            start_page = self.start_page,
            resume_page = self.resume_page,
            pages_succeeded = self.pages_succeeded,
            pages_failed = self.pages_failed,
            records = self.records_processed,
            artifacts = self.artifacts_found,
            rows = self.rows_produced,
            downloaded = self.downloaded,
            converted = self.converted,
            uploaded = self.uploaded,
            ledger_size = self.ledger_size,
            count_ms = self.timings.count.as_millis() as u64,
            extraction_ms = self.timings.extraction.as_millis() as u64,
            output_ms = self.timings.output.as_millis() as u64,
            upload_ms = self.timings.upload.as_millis() as u64,
            duration_secs = self.duration.as_secs(),
            success_rate = format!("{:.2}%", self.success_rate()),
            "Extraction run finished"
        );

        if self.error_count > 0 {
            tracing::warn!(
                error_count = self.error_count,
                sampled = self.errors.len(),
                "Extraction run finished with errors"
            );
            for error in &self.errors {
                tracing::warn!(message = %error, "Run error");
            }
        }
    }
}

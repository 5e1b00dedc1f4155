//! Checkpoint model for resumable extraction
//!
//! A checkpoint records the first page a new run should dispatch and the
//! ledger of keys already emitted. It is written only by the coordinator.

use crate::core::state::ledger::IdempotencyLedger;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Durable resume state
///
/// # Examples
///
/// ```
/// use pagefold::core::state::Checkpoint;
///
/// let mut checkpoint = Checkpoint::new("nightly");
/// checkpoint.advance_to(3);
/// checkpoint.advance_to(1);
/// assert_eq!(checkpoint.resume_page, 3);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Identifier of this checkpoint
    #[serde(default = "default_checkpoint_id")]
    pub checkpoint_id: String,

    /// First page not yet known to be fully merged
    #[serde(default)]
    pub resume_page: u64,

    /// Keys already emitted to output
    #[serde(default)]
    pub processed_keys: IdempotencyLedger,

    /// Page count observed by the last run
    #[serde(default)]
    pub total_pages: Option<u64>,

    /// Run that last wrote this checkpoint
    #[serde(default)]
    pub last_run_id: Option<String>,

    /// When this checkpoint was last written
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Checkpoint {
    /// An empty checkpoint: resume from page 0 with no processed keys
    pub fn new(checkpoint_id: impl Into<String>) -> Self {
        Self {
            checkpoint_id: checkpoint_id.into(),
            resume_page: 0,
            processed_keys: IdempotencyLedger::new(),
            total_pages: None,
            last_run_id: None,
            updated_at: None,
        }
    }

    /// Moves `resume_page` forward; never moves it back
    pub fn advance_to(&mut self, page: u64) {
        if page > self.resume_page {
            self.resume_page = page;
        }
    }

    /// Merges keys returned by a succeeded unit, returning how many were new
    pub fn merge_keys<I>(&mut self, keys: I, emitted_at: DateTime<Utc>) -> usize
    where
        I: IntoIterator<Item = String>,
    {
        self.processed_keys.extend(keys, emitted_at)
    }

    /// Stamps the checkpoint before it is persisted
    pub fn touch(&mut self, run_id: &str) {
        self.last_run_id = Some(run_id.to_string());
        self.updated_at = Some(Utc::now());
    }

    /// Whether every known page has been merged
    pub fn is_complete(&self) -> bool {
        matches!(self.total_pages, Some(total) if self.resume_page >= total)
    }
}

impl Default for Checkpoint {
    fn default() -> Self {
        Self::new(default_checkpoint_id())
    }
}

fn default_checkpoint_id() -> String {
    "default".to_string()
}

/// First page at or after `resume_page` that did not succeed
///
/// Pages `[resume_page, result)` form the contiguous succeeded prefix;
/// the next run resumes from the returned page.
pub fn contiguous_resume_page(
    resume_page: u64,
    total_pages: u64,
    succeeded: impl Fn(u64) -> bool,
) -> u64 {
    (resume_page..total_pages)
        .find(|page| !succeeded(*page))
        .unwrap_or(total_pages.max(resume_page))
}

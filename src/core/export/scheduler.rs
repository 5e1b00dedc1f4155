//! Task scheduler for page units
//!
//! [`TaskScheduler`] is the submit / wait-with-timeout seam between the
//! coordinator and the worker pool. [`TokioScheduler`] runs units as tokio
//! tasks, bounded by a semaphore, and retries transient page failures with
//! backoff.
//!
//! Each unit moves through
//! `Pending -> Running -> {Succeeded, Retrying -> Running, FailedFinal}`.

use crate::core::export::unit::{UnitOfWork, UnitResult};
use crate::core::retry::RetryPolicy;
use crate::domain::{PagefoldError, Result};
use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

/// Lifecycle state of one page unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PageState {
    Pending,
    Running,
    /// Waiting before retry number `attempt`
    Retrying { attempt: usize },
    Succeeded,
    FailedFinal,
}

impl fmt::Display for PageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageState::Pending => write!(f, "pending"),
            PageState::Running => write!(f, "running"),
            PageState::Retrying { attempt } => write!(f, "retrying ({attempt})"),
            PageState::Succeeded => write!(f, "succeeded"),
            PageState::FailedFinal => write!(f, "failed"),
        }
    }
}

/// Handle to a submitted unit
///
/// Dropping the handle detaches the unit; it is never cancelled.
pub struct UnitHandle {
    pub page: u64,
    handle: JoinHandle<UnitResult>,
}

impl UnitHandle {
    pub fn new(page: u64, handle: JoinHandle<UnitResult>) -> Self {
        Self { page, handle }
    }
}

/// Scheduling substrate for page units
#[async_trait]
pub trait TaskScheduler: Send + Sync {
    /// Starts `unit` and returns immediately
    fn submit(&self, unit: UnitOfWork) -> UnitHandle;

    /// Waits for every handle, returning results in completion order
    ///
    /// # Errors
    ///
    /// Returns [`PagefoldError::FanInTimeout`] when `timeout` elapses first.
    /// Units still running are abandoned, not cancelled.
    async fn wait(&self, handles: Vec<UnitHandle>, timeout: Duration) -> Result<Vec<UnitResult>>;

    /// Last known state of every submitted page
    fn page_states(&self) -> BTreeMap<u64, PageState>;
}

type StateTracker = Arc<Mutex<BTreeMap<u64, PageState>>>;

/// Runs units as tokio tasks
pub struct TokioScheduler {
    semaphore: Arc<Semaphore>,
    retry: RetryPolicy,
    tracker: StateTracker,
}

impl TokioScheduler {
    /// At most `max_concurrent_units` units run at once
    pub fn new(max_concurrent_units: usize, retry: RetryPolicy) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent_units.max(1))),
            retry,
            tracker: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }
}

fn set_state(tracker: &StateTracker, page: u64, state: PageState) {
    if let Ok(mut states) = tracker.lock() {
        states.insert(page, state);
    }
}

async fn run_with_retry(unit: UnitOfWork, retry: RetryPolicy, tracker: StateTracker) -> UnitResult {
    let page = unit.page().index;
    let started = Instant::now();
    let mut attempt = 1;

    loop {
        set_state(&tracker, page, PageState::Running);
        crate::log_unit_start!(page, attempt);

        match unit.run().await {
            Ok(mut result) => {
                result.attempts = attempt;
                result.duration = started.elapsed();
                set_state(&tracker, page, PageState::Succeeded);
                crate::log_unit_complete!(page, result.records_processed, result.rows_produced, result.duration);
                return result;
            }
            Err(e) if e.is_transient() && attempt <= retry.max_retries => {
                let delay = retry.delay_for(attempt);
                set_state(&tracker, page, PageState::Retrying { attempt });
                crate::log_retry_attempt!(attempt, retry.max_retries, e);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                set_state(&tracker, page, PageState::FailedFinal);
                tracing::error!(page, attempts = attempt, error = %e, "Page unit failed");
                let mut result = UnitResult::failed(page, format!("page {page}: {e}"), attempt);
                result.duration = started.elapsed();
                return result;
            }
        }
    }
}

#[async_trait]
impl TaskScheduler for TokioScheduler {
    fn submit(&self, unit: UnitOfWork) -> UnitHandle {
        let page = unit.page().index;
        set_state(&self.tracker, page, PageState::Pending);

        let semaphore = self.semaphore.clone();
        let retry = self.retry.clone();
        let tracker = self.tracker.clone();

        let handle = tokio::spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    set_state(&tracker, page, PageState::FailedFinal);
                    return UnitResult::failed(page, "scheduler closed", 0);
                }
            };
            run_with_retry(unit, retry, tracker).await
        });

        UnitHandle::new(page, handle)
    }

    async fn wait(&self, mut handles: Vec<UnitHandle>, timeout: Duration) -> Result<Vec<UnitResult>> {
        let total = handles.len();
        let mut results = Vec::with_capacity(total);

        let joined = tokio::time::timeout(timeout, async {
            let mut pending: FuturesUnordered<_> = handles
                .iter_mut()
                .map(|h| {
                    let page = h.page;
                    let handle = &mut h.handle;
                    async move { (page, handle.await) }
                })
                .collect();

            while let Some((page, joined)) = pending.next().await {
                let result = match joined {
                    Ok(result) => result,
                    Err(e) => {
                        set_state(&self.tracker, page, PageState::FailedFinal);
                        tracing::error!(page, error = %e, "Page unit aborted");
                        UnitResult::failed(page, format!("page {page}: unit aborted: {e}"), 0)
                    }
                };
                results.push(result);
            }
        })
        .await;

        match joined {
            Ok(()) => Ok(results),
            Err(_) => {
                let pending = total - results.len();
                tracing::error!(
                    timeout_secs = timeout.as_secs(),
                    completed = results.len(),
                    pending,
                    "Fan-in timed out; abandoning outstanding units"
                );
                Err(PagefoldError::FanInTimeout {
                    seconds: timeout.as_secs(),
                    pending,
                })
            }
        }
    }

    fn page_states(&self) -> BTreeMap<u64, PageState> {
        self.tracker
            .lock()
            .map(|states| states.clone())
            .unwrap_or_default()
    }
}

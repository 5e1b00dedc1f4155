//! Dispatch and fan-in of page units
//!
//! This module provides the run orchestration for Pagefold:
//! - [`unit`] - the page-scoped unit of work and its result
//! - [`scheduler`] - the submit / wait-with-timeout seam and the tokio pool
//! - [`coordinator`] - one run: checkpoint, dispatch, fan-in, merge, output
//! - [`summary`] - run summary and reporting

pub mod coordinator;
pub mod scheduler;
pub mod summary;
pub mod unit;

pub use coordinator::{Collaborators, DispatchSettings, ExtractionCoordinator};
pub use scheduler::{PageState, TaskScheduler, TokioScheduler, UnitHandle};
pub use summary::{PhaseTimings, RunOutcome, RunSummary, MAX_ERROR_SAMPLES};
pub use unit::{UnitContext, UnitOfWork, UnitResult};

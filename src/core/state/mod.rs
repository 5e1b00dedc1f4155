// Checkpoint state and the idempotency ledger

pub mod checkpoint;
pub mod ledger;
pub mod manager;

pub use checkpoint::{contiguous_resume_page, Checkpoint};
pub use ledger::{IdempotencyLedger, KeySet, RunningKeys};
pub use manager::CheckpointStore;

//! Record transformation
//!
//! Folding of joined source rows into per-artifact records and flat output
//! rows. See [`fold::RecordFolder`].

pub mod fold;

pub use fold::{file_stem, FoldOutput, RecordFolder, ARTIFACTS_DIR, CONVERTED_DIR};

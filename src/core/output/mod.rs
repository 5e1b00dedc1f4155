//! Tabular output
//!
//! [`OutputWriter`] writes the merged rows of a run to one CSV table and
//! reports its checksum. Publishing the table and the staged artifact trees
//! is done by the coordinator through an
//! [`ObjectStorageUploader`](crate::adapters::artifacts::ObjectStorageUploader).

pub mod writer;

pub use writer::{file_checksum, union_header, OutputReport, OutputWriter};

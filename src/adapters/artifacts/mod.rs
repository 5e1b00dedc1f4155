//! Artifact download, conversion and publish
//!
//! - [`traits`] - the collaborator seams used by the core
//! - [`http`] - HTTP(S) downloader
//! - [`command`] - external-program format converter
//! - [`object_storage`] - bucket uploader

pub mod command;
pub mod http;
pub mod object_storage;
pub mod traits;

pub use command::CommandConverter;
pub use http::HttpDownloader;
pub use object_storage::{object_name, HttpObjectStorage};
pub use traits::{FileDownloader, FormatConverter, ObjectStorageUploader};

//! Paginated extraction from the relational source
//!
//! - [`fetcher`] - the [`PageFetcher`] seam and page arithmetic
//! - [`batch`] - contiguous partition of a page into batches

pub mod batch;
pub mod fetcher;

pub use batch::BatchSplitter;
pub use fetcher::{total_pages, FetchedPage, Page, PageFetcher};

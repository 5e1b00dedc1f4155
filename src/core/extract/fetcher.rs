//! Page fetcher trait and page arithmetic

use crate::domain::{PagefoldError, Result, SourceRow};
use async_trait::async_trait;
use std::fmt;

/// One page of the ordered source result set
///
/// Covers rows `[offset, offset + size)` where `offset = index * size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Page {
    pub index: u64,
    pub size: usize,
}

impl Page {
    pub fn new(index: u64, size: usize) -> Self {
        Self { index, size }
    }

    /// Row offset of the first row of this page
    pub fn offset(&self) -> u64 {
        self.index.saturating_mul(self.size as u64)
    }

    /// Maximum number of rows in this page
    pub fn limit(&self) -> u64 {
        self.size as u64
    }
}

impl fmt::Display for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "page {} (offset {}, limit {})", self.index, self.offset(), self.size)
    }
}

/// Number of pages needed to cover `count` rows
pub fn total_pages(count: u64, page_size: usize) -> u64 {
    if page_size == 0 {
        return 0;
    }
    count.div_ceil(page_size as u64)
}

/// Rows of one page plus the rows that could not be decoded
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchedPage {
    pub rows: Vec<SourceRow>,
    /// One message per rejected row; rejected rows are dropped from the page
    pub rejected: Vec<String>,
}

impl FetchedPage {
    /// Splits per-row decode results into accepted rows and rejections
    pub fn from_results<I>(page: Page, results: I) -> Self
    where
        I: IntoIterator<Item = Result<SourceRow>>,
    {
        let mut fetched = Self::default();
        for (position, result) in results.into_iter().enumerate() {
            match result {
                Ok(row) => fetched.rows.push(row),
                Err(e) => fetched.reject(page, position, &e),
            }
        }
        fetched
    }

    fn reject(&mut self, page: Page, position: usize, error: &PagefoldError) {
        let row = page.offset() + position as u64;
        tracing::warn!(page = page.index, row, error = %error, "Skipping undecodable source row");
        self.rejected.push(format!("row {row}: {error}"));
    }
}

impl From<Vec<SourceRow>> for FetchedPage {
    fn from(rows: Vec<SourceRow>) -> Self {
        Self {
            rows,
            rejected: Vec::new(),
        }
    }
}

/// Read-only, deterministically ordered, paginated source
///
/// Rows must be ordered by
/// `(parent_id, group_number, item_number, artifact_path, text_created_at)`
/// so that the same page index always yields the same rows. Page-level
/// retries rely on this.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Total number of rows matching the extraction filter
    async fn count(&self) -> Result<u64>;

    /// Rows of one page, in source order
    ///
    /// A row that cannot be decoded is reported in
    /// [`FetchedPage::rejected`] instead of failing the page.
    async fn fetch_page(&self, page: Page) -> Result<FetchedPage>;
}

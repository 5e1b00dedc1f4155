//! PostgreSQL page fetcher
//!
//! Runs the configured count and page queries. The page query binds
//! `$1 = offset` and `$2 = limit` and returns the nine source columns by name.
//! Rows that fail to decode are dropped from the page and reported.

use crate::adapters::postgresql::client::PostgreSQLClient;
use crate::core::extract::{FetchedPage, Page, PageFetcher};
use crate::domain::{GroupId, ItemId, PagefoldError, ParentId, Result, SourceError, SourceRow};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use std::sync::Arc;
use tokio_postgres::Row;

/// Reads pages of the joined extraction view
pub struct PostgresPageFetcher {
    client: Arc<PostgreSQLClient>,
    count_query: String,
    page_query: String,
}

impl PostgresPageFetcher {
    pub fn new(client: Arc<PostgreSQLClient>, count_query: String, page_query: String) -> Self {
        Self {
            client,
            count_query,
            page_query,
        }
    }
}

#[async_trait]
impl PageFetcher for PostgresPageFetcher {
    async fn count(&self) -> Result<u64> {
        let rows = self.client.query(&self.count_query, &[]).await?;
        let row = rows
            .first()
            .ok_or_else(|| SourceError::InvalidRow("count query returned no rows".to_string()))?;
        let count = integer_column(row, 0)?
            .ok_or_else(|| SourceError::InvalidRow("count query returned NULL".to_string()))?;

        tracing::info!(rows = count, "Counted source rows");
        Ok(count.max(0) as u64)
    }

    async fn fetch_page(&self, page: Page) -> Result<FetchedPage> {
        let offset = page.offset() as i64;
        let limit = page.limit() as i64;
        let rows = self
            .client
            .query(&self.page_query, &[&offset, &limit])
            .await?;

        tracing::debug!(page = page.index, offset, limit, rows = rows.len(), "Fetched page");

        Ok(FetchedPage::from_results(page, rows.iter().map(map_row)))
    }
}

/// Maps one result row to a [`SourceRow`]
fn map_row(row: &Row) -> Result<SourceRow> {
    Ok(SourceRow {
        parent_id: ParentId::new(required_id(row, "parent_id")?).map_err(SourceError::InvalidRow)?,
        group_id: GroupId::new(required_id(row, "group_id")?).map_err(SourceError::InvalidRow)?,
        item_id: ItemId::new(required_id(row, "item_id")?).map_err(SourceError::InvalidRow)?,
        artifact_path: optional_text(row, "artifact_path")?,
        artifact_url: optional_text(row, "artifact_url")?,
        text_value: optional_text(row, "text_value")?,
        text_created_at: optional_timestamp(row, "text_created_at")?,
        group_number: optional_i32(row, "group_number")?,
        item_number: optional_i32(row, "item_number")?,
    })
}

/// Identifier columns may be text, integer or uuid
fn required_id(row: &Row, column: &str) -> Result<String> {
    let value = if let Ok(v) = row.try_get::<_, Option<String>>(column) {
        v
    } else if let Ok(v) = row.try_get::<_, Option<i64>>(column) {
        v.map(|n| n.to_string())
    } else if let Ok(v) = row.try_get::<_, Option<i32>>(column) {
        v.map(|n| n.to_string())
    } else {
        row.try_get::<_, Option<uuid::Uuid>>(column)
            .map_err(|e| SourceError::InvalidRow(format!("column {column}: {e}")))?
            .map(|u| u.to_string())
    };
    value.ok_or_else(|| SourceError::InvalidRow(format!("column {column} is NULL")).into())
}

fn optional_text(row: &Row, column: &str) -> Result<Option<String>> {
    row.try_get::<_, Option<String>>(column)
        .map_err(|e| SourceError::InvalidRow(format!("column {column}: {e}")).into())
}

fn optional_i32(row: &Row, column: &str) -> Result<Option<i32>> {
    if let Ok(v) = row.try_get::<_, Option<i32>>(column) {
        return Ok(v);
    }
    if let Ok(v) = row.try_get::<_, Option<i16>>(column) {
        return Ok(v.map(i32::from));
    }
    let wide = row
        .try_get::<_, Option<i64>>(column)
        .map_err(|e| SourceError::InvalidRow(format!("column {column}: {e}")))?;
    match wide {
        None => Ok(None),
        Some(n) => i32::try_from(n).map(Some).map_err(|_| {
            PagefoldError::from(SourceError::InvalidRow(format!(
                "column {column} out of range: {n}"
            )))
        }),
    }
}

/// Accepts both `timestamptz` and `timestamp` (read as UTC)
fn optional_timestamp(row: &Row, column: &str) -> Result<Option<DateTime<Utc>>> {
    if let Ok(v) = row.try_get::<_, Option<DateTime<Utc>>>(column) {
        return Ok(v);
    }
    row.try_get::<_, Option<NaiveDateTime>>(column)
        .map(|v| v.map(|naive| naive.and_utc()))
        .map_err(|e| SourceError::InvalidRow(format!("column {column}: {e}")).into())
}

fn integer_column(row: &Row, index: usize) -> Result<Option<i64>> {
    if let Ok(v) = row.try_get::<_, Option<i64>>(index) {
        return Ok(v);
    }
    row.try_get::<_, Option<i32>>(index)
        .map(|v| v.map(i64::from))
        .map_err(|e| SourceError::InvalidRow(format!("count column: {e}")).into())
}

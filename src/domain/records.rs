//! Typed records flowing through an extraction run
//!
//! [`SourceRow`] is what the source yields, [`ArtifactRecord`] and
//! [`ParentTextAggregate`] are the folded intermediate state inside one unit,
//! and [`OutputRow`] is the flat record written to the output table.

use crate::domain::ids::{ArtifactKey, GroupId, ItemId, ParentId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Separator used when joining a parent's text values into `report_value`
pub const REPORT_SEPARATOR: &str = " | ";

/// One joined record from the source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRow {
    pub parent_id: ParentId,
    pub group_id: GroupId,
    pub item_id: ItemId,
    pub artifact_path: Option<String>,
    pub artifact_url: Option<String>,
    pub text_value: Option<String>,
    pub text_created_at: Option<DateTime<Utc>>,
    pub group_number: Option<i32>,
    pub item_number: Option<i32>,
}

impl SourceRow {
    /// The idempotency key of the artifact this row describes
    pub fn key(&self) -> ArtifactKey {
        ArtifactKey::new(
            self.parent_id.clone(),
            self.group_id.clone(),
            self.item_id.clone(),
            self.artifact_path.clone(),
        )
    }
}

/// Folded per-artifact state
///
/// Static attributes come from the first row seen for the key.
/// `text_created_at` only moves forward.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactRecord {
    pub key: ArtifactKey,
    pub group_number: Option<i32>,
    pub item_number: Option<i32>,
    pub artifact_url: Option<String>,
    pub text_created_at: Option<DateTime<Utc>>,
}

impl ArtifactRecord {
    /// Builds the record from the first row observed for its key
    pub fn from_row(row: &SourceRow) -> Self {
        Self {
            key: row.key(),
            group_number: row.group_number,
            item_number: row.item_number,
            artifact_url: row.artifact_url.clone(),
            text_created_at: row.text_created_at,
        }
    }

    /// Advances `text_created_at` to `candidate` if it is newer
    pub fn observe_created_at(&mut self, candidate: Option<DateTime<Utc>>) {
        if let Some(ts) = candidate {
            match self.text_created_at {
                Some(current) if current >= ts => {}
                _ => self.text_created_at = Some(ts),
            }
        }
    }
}

/// One distinct text value contributed to a parent
#[derive(Debug, Clone, PartialEq)]
pub struct TextEntry {
    pub value: String,
    pub created_at: Option<DateTime<Utc>>,
}

/// Ordered, exact-match deduplicated text values of one parent entity
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParentTextAggregate {
    entries: Vec<TextEntry>,
}

impl ParentTextAggregate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the value unless an identical one is already present
    ///
    /// Returns true if the value was new.
    pub fn push(&mut self, value: &str, created_at: Option<DateTime<Utc>>) -> bool {
        if self.contains(value) {
            return false;
        }
        self.entries.push(TextEntry {
            value: value.to_string(),
            created_at,
        });
        true
    }

    pub fn contains(&self, value: &str) -> bool {
        self.entries.iter().any(|e| e.value == value)
    }

    pub fn entries(&self) -> &[TextEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Values joined with [`REPORT_SEPARATOR`] in first-seen order
    pub fn joined(&self) -> String {
        self.entries
            .iter()
            .map(|e| e.value.as_str())
            .collect::<Vec<_>>()
            .join(REPORT_SEPARATOR)
    }
}

/// Flat record written to the output table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputRow {
    pub key: String,
    pub parent_id: String,
    pub group_id: String,
    pub item_id: String,
    pub group_number: Option<i32>,
    pub item_number: Option<i32>,
    pub artifact_path: Option<String>,
    pub artifact_url: Option<String>,
    pub text_created_at: Option<DateTime<Utc>>,
    pub report_value: String,
    pub local_path: Option<String>,
    pub downloaded: bool,
    pub converted_path: Option<String>,
    pub converted: bool,
}

impl OutputRow {
    /// Field name to cell value mapping used by the tabular writer
    ///
    /// Absent optional values become empty cells.
    pub fn to_record(&self) -> BTreeMap<String, String> {
        fn opt<T: ToString>(v: &Option<T>) -> String {
            v.as_ref().map(ToString::to_string).unwrap_or_default()
        }

        let mut record = BTreeMap::new();
        record.insert("key".to_string(), self.key.clone());
        record.insert("parent_id".to_string(), self.parent_id.clone());
        record.insert("group_id".to_string(), self.group_id.clone());
        record.insert("item_id".to_string(), self.item_id.clone());
        record.insert("group_number".to_string(), opt(&self.group_number));
        record.insert("item_number".to_string(), opt(&self.item_number));
        record.insert("artifact_path".to_string(), opt(&self.artifact_path));
        record.insert("artifact_url".to_string(), opt(&self.artifact_url));
        record.insert(
            "text_created_at".to_string(),
            self.text_created_at
                .map(|ts| ts.to_rfc3339())
                .unwrap_or_default(),
        );
        record.insert("report_value".to_string(), self.report_value.clone());
        record.insert("local_path".to_string(), opt(&self.local_path));
        record.insert("downloaded".to_string(), self.downloaded.to_string());
        record.insert("converted_path".to_string(), opt(&self.converted_path));
        record.insert("converted".to_string(), self.converted.to_string());
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn row(text: Option<&str>, secs: i64) -> SourceRow {
        SourceRow {
            parent_id: ParentId::new("P1").unwrap(),
            group_id: GroupId::new("G1").unwrap(),
            item_id: ItemId::new("I1").unwrap(),
            artifact_path: Some("p/i1.dcm".to_string()),
            artifact_url: Some("https://files.example.com/i1.dcm".to_string()),
            text_value: text.map(str::to_string),
            text_created_at: Some(Utc.timestamp_opt(secs, 0).unwrap()),
            group_number: Some(1),
            item_number: Some(7),
        }
    }

    #[test]
    fn test_artifact_record_created_at_is_monotonic() {
        let mut record = ArtifactRecord::from_row(&row(None, 100));
        record.observe_created_at(Some(Utc.timestamp_opt(50, 0).unwrap()));
        assert_eq!(record.text_created_at, Some(Utc.timestamp_opt(100, 0).unwrap()));
        record.observe_created_at(Some(Utc.timestamp_opt(200, 0).unwrap()));
        assert_eq!(record.text_created_at, Some(Utc.timestamp_opt(200, 0).unwrap()));
        record.observe_created_at(None);
        assert_eq!(record.text_created_at, Some(Utc.timestamp_opt(200, 0).unwrap()));
    }

    #[test]
    fn test_text_aggregate_dedup_is_case_sensitive() {
        let mut agg = ParentTextAggregate::new();
        assert!(agg.push("Normal", None));
        assert!(!agg.push("Normal", None));
        assert!(agg.push("normal", None));
        assert_eq!(agg.joined(), "Normal | normal");
        assert_eq!(agg.len(), 2);
    }

    #[test]
    fn test_output_row_record_has_empty_cells_for_missing_values() {
        let out = OutputRow {
            key: "k".to_string(),
            parent_id: "P1".to_string(),
            group_id: "G1".to_string(),
            item_id: "I1".to_string(),
            group_number: None,
            item_number: Some(3),
            artifact_path: None,
            artifact_url: None,
            text_created_at: None,
            report_value: String::new(),
            local_path: None,
            downloaded: false,
            converted_path: None,
            converted: false,
        };
        let record = out.to_record();
        assert_eq!(record["group_number"], "");
        assert_eq!(record["item_number"], "3");
        assert_eq!(record["downloaded"], "false");
        assert_eq!(record.len(), 14);
    }
}

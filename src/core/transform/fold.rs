//! Record folding
//!
//! Turns a batch of joined [`SourceRow`]s into one record per artifact key plus
//! the text values aggregated per parent entity, skipping keys that were
//! already emitted.

use crate::core::state::KeySet;
use crate::domain::{ArtifactRecord, OutputRow, ParentId, ParentTextAggregate, SourceRow};
use indexmap::map::Entry;
use indexmap::IndexMap;
use std::path::{Path, PathBuf};

/// Directory under the output root where downloaded artifacts are staged
pub const ARTIFACTS_DIR: &str = "artifacts";

/// Directory under the output root where converted artifacts are written
pub const CONVERTED_DIR: &str = "converted";

/// Result of folding one batch
#[derive(Debug, Clone, Default)]
pub struct FoldOutput {
    /// One record per new key, in first-seen order
    pub artifacts: IndexMap<String, ArtifactRecord>,
    /// Distinct text values per parent, in first-seen order
    pub parent_texts: IndexMap<ParentId, ParentTextAggregate>,
    /// New keys, each listed once, in first-seen order
    pub new_keys: Vec<String>,
    /// Rows skipped because their key was already emitted
    pub skipped_rows: usize,
}

/// Folds batches and emits output rows
#[derive(Debug, Clone)]
pub struct RecordFolder {
    output_dir: PathBuf,
    artifact_extension: String,
}

impl RecordFolder {
    pub fn new(output_dir: impl Into<PathBuf>, artifact_extension: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            artifact_extension: artifact_extension.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Folds `batch`, ignoring every row whose key is in `processed`
    ///
    /// Static artifact fields come from the first row of a key;
    /// `text_created_at` advances to the newest value seen. Text values are
    /// aggregated per parent, not per artifact.
    pub fn fold(&self, batch: &[SourceRow], processed: &dyn KeySet) -> FoldOutput {
        let mut out = FoldOutput::default();

        for row in batch {
            let key = row.key().canonical();
            if processed.contains_key(&key) {
                out.skipped_rows += 1;
                continue;
            }

            let record = match out.artifacts.entry(key) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => {
                    out.new_keys.push(entry.key().clone());
                    entry.insert(ArtifactRecord::from_row(row))
                }
            };
            record.observe_created_at(row.text_created_at);

            if let Some(text) = row.text_value.as_deref() {
                out.parent_texts
                    .entry(row.parent_id.clone())
                    .or_default()
                    .push(text, row.text_created_at);
            }
        }

        out
    }

    /// Builds one output row per folded key that is not in `processed`
    ///
    /// Rows with a source URL get a staging path
    /// `{output_dir}/artifacts/{item_id}.{ext}`; rows without one are recorded
    /// but never downloaded.
    pub fn emit_rows(&self, folded: &FoldOutput, processed: &dyn KeySet) -> Vec<OutputRow> {
        folded
            .artifacts
            .iter()
            .filter(|(key, _)| !processed.contains_key(key))
            .map(|(key, record)| {
                let report_value = folded
                    .parent_texts
                    .get(&record.key.parent_id)
                    .map(ParentTextAggregate::joined)
                    .unwrap_or_default();

                let local_path = record.artifact_url.as_ref().map(|_| {
                    self.staging_path(record.key.item_id.as_str())
                        .to_string_lossy()
                        .into_owned()
                });

                OutputRow {
                    key: key.clone(),
                    parent_id: record.key.parent_id.to_string(),
                    group_id: record.key.group_id.to_string(),
                    item_id: record.key.item_id.to_string(),
                    group_number: record.group_number,
                    item_number: record.item_number,
                    artifact_path: record.key.artifact_path.clone(),
                    artifact_url: record.artifact_url.clone(),
                    text_created_at: record.text_created_at,
                    report_value,
                    local_path,
                    downloaded: false,
                    converted_path: None,
                    converted: false,
                }
            })
            .collect()
    }

    /// Deterministic staging path of an item's artifact
    pub fn staging_path(&self, item_id: &str) -> PathBuf {
        self.output_dir
            .join(ARTIFACTS_DIR)
            .join(format!("{}.{}", file_stem(item_id), self.artifact_extension))
    }
}

/// Maps an identifier to a file stem that stays inside its directory
pub fn file_stem(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect::<String>()
        .trim_start_matches('.')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::state::IdempotencyLedger;
    use crate::domain::{GroupId, ItemId};
    use chrono::{DateTime, TimeZone, Utc};
    use std::collections::HashSet;

    fn ts(secs: i64) -> Option<DateTime<Utc>> {
        Some(Utc.timestamp_opt(secs, 0).unwrap())
    }

    fn row(parent: &str, item: &str, text: Option<&str>, at: i64) -> SourceRow {
        SourceRow {
            parent_id: ParentId::new(parent).unwrap(),
            group_id: GroupId::new("G1").unwrap(),
            item_id: ItemId::new(item).unwrap(),
            artifact_path: Some(format!("{parent}/{item}.dcm")),
            artifact_url: Some(format!("https://files.example.com/{item}.dcm")),
            text_value: text.map(str::to_string),
            text_created_at: ts(at),
            group_number: Some(1),
            item_number: Some(at as i32),
        }
    }

    fn empty() -> HashSet<String> {
        HashSet::new()
    }

    fn folder() -> RecordFolder {
        RecordFolder::new("/out", "dcm")
    }

    #[test]
    fn test_fold_groups_rows_by_key() {
        let batch = vec![
            row("P1", "I1", Some("A"), 1),
            row("P1", "I1", Some("B"), 3),
            row("P1", "I1", None, 2),
        ];
        let out = folder().fold(&batch, &empty());

        assert_eq!(out.artifacts.len(), 1);
        assert_eq!(out.new_keys.len(), 1);
        let record = &out.artifacts[0];
        assert_eq!(record.text_created_at, ts(3));
        assert_eq!(record.item_number, Some(1));
    }

    #[test]
    fn test_fold_skips_processed_keys() {
        let batch = vec![row("P1", "I1", Some("A"), 1), row("P1", "I2", Some("B"), 2)];
        let processed: HashSet<String> = [batch[0].key().canonical()].into_iter().collect();
        let out = folder().fold(&batch, &processed);

        assert_eq!(out.skipped_rows, 1);
        assert_eq!(out.new_keys, vec![batch[1].key().canonical()]);
        assert_eq!(out.parent_texts[&ParentId::new("P1").unwrap()].joined(), "B");
    }

    #[test]
    fn test_fold_twice_with_merged_keys_is_empty() {
        let batch = vec![row("P1", "I1", Some("A"), 1), row("P2", "I2", None, 2)];
        let first = folder().fold(&batch, &IdempotencyLedger::new());

        let mut ledger = IdempotencyLedger::new();
        ledger.extend(first.new_keys.clone(), Utc::now());
        let second = folder().fold(&batch, &ledger);

        assert!(second.artifacts.is_empty());
        assert!(second.new_keys.is_empty());
        assert_eq!(second.skipped_rows, 2);
    }

    #[test]
    fn test_text_aggregation_is_parent_scoped() {
        let batch = vec![
            row("P1", "I1", Some("Normal"), 1),
            row("P1", "I2", Some("Follow-up"), 2),
            row("P1", "I2", Some("Normal"), 3),
        ];
        let f = folder();
        let out = f.fold(&batch, &empty());
        let rows = f.emit_rows(&out, &empty());

        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.report_value == "Normal | Follow-up"));
    }

    #[test]
    fn test_new_key_without_text_is_still_recorded() {
        let batch = vec![row("P1", "I1", None, 1)];
        let f = folder();
        let out = f.fold(&batch, &empty());
        let rows = f.emit_rows(&out, &empty());

        assert_eq!(out.new_keys.len(), 1);
        assert_eq!(rows[0].report_value, "");
    }

    #[test]
    fn test_emit_rows_staging_path() {
        let mut no_url = row("P1", "I2", None, 1);
        no_url.artifact_url = None;
        let batch = vec![row("P1", "I1", None, 1), no_url];
        let f = folder();
        let rows = f.emit_rows(&f.fold(&batch, &empty()), &empty());

        assert_eq!(rows[0].local_path.as_deref(), Some("/out/artifacts/I1.dcm"));
        assert_eq!(rows[1].local_path, None);
        assert!(!rows[0].downloaded);
    }

    #[test]
    fn test_emit_rows_filters_processed() {
        let batch = vec![row("P1", "I1", None, 1), row("P1", "I2", None, 2)];
        let f = folder();
        let out = f.fold(&batch, &empty());
        let processed: HashSet<String> = [out.new_keys[0].clone()].into_iter().collect();

        let rows = f.emit_rows(&out, &processed);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].item_id, "I2");
    }

    #[test]
    fn test_file_stem_stays_in_directory() {
        assert_eq!(file_stem("1.2.840.113619"), "1.2.840.113619");
        assert_eq!(file_stem("../etc/passwd"), "_etc_passwd");
        assert_eq!(file_stem("a b"), "a_b");
    }
}

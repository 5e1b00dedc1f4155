//! Tabular output writer
//!
//! Writes the rows merged from all succeeded units to one CSV table. The
//! header is the sorted union of field names across rows.

use crate::domain::{OutputRow, PagefoldError, Result};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File, OpenOptions};
use std::io::Read;
use std::path::{Path, PathBuf};

/// What the writer did with the table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputReport {
    pub path: PathBuf,
    pub rows_written: usize,
    /// Rows were appended to an existing table with the same header
    pub appended: bool,
    /// SHA-256 of the table file after writing, hex-encoded
    pub checksum: String,
}

/// CSV table writer
#[derive(Debug, Clone)]
pub struct OutputWriter {
    path: PathBuf,
    append_existing: bool,
}

impl OutputWriter {
    pub fn new(path: impl Into<PathBuf>, append_existing: bool) -> Self {
        Self {
            path: path.into(),
            append_existing,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The writer used by dry runs: a fresh `{stem}.dry-run.csv` next to the
    /// real table, which is never touched
    pub fn for_dry_run(&self) -> Self {
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            path: self.path.with_file_name(format!("{stem}.dry-run.csv")),
            append_existing: false,
        }
    }

    /// Writes `rows` to the table
    ///
    /// Returns `None` when there is nothing to write. With `append_existing`
    /// the rows of an existing table are kept: new rows are appended when
    /// the header is unchanged, otherwise the table is rebuilt under the
    /// union header. Without it the table holds only `rows`. Rewrites are
    /// atomic.
    pub fn write(&self, rows: &[OutputRow]) -> Result<Option<OutputReport>> {
        if rows.is_empty() {
            tracing::info!(path = %self.path.display(), "No rows to write");
            return Ok(None);
        }

        let records: Vec<BTreeMap<String, String>> = rows.iter().map(OutputRow::to_record).collect();

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let existing = if self.append_existing {
            self.existing_records()?
        } else {
            None
        };

        let (header, appended) = match existing {
            Some((existing_header, _)) if existing_header == union_header(&records) => {
                let file = OpenOptions::new().append(true).open(&self.path)?;
                let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
                write_records(&mut writer, &existing_header, &records)?;
                writer.flush()?;
                (existing_header, true)
            }
            Some((existing_header, mut previous)) => {
                tracing::info!(
                    path = %self.path.display(),
                    kept = previous.len(),
                    "Header changed; rebuilding table with existing rows"
                );
                let header: Vec<String> = existing_header
                    .into_iter()
                    .chain(union_header(&records))
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .collect();
                previous.extend(records.iter().cloned());
                self.rewrite(&header, &previous)?;
                (header, false)
            }
            None => {
                let header = union_header(&records);
                self.rewrite(&header, &records)?;
                (header, false)
            }
        };

        let checksum = file_checksum(&self.path)?;

        tracing::info!(
            path = %self.path.display(),
            rows = records.len(),
            columns = header.len(),
            appended,
            checksum = %checksum,
            "Wrote output table"
        );

        Ok(Some(OutputReport {
            path: self.path.clone(),
            rows_written: records.len(),
            appended,
            checksum,
        }))
    }

    fn rewrite(&self, header: &[String], records: &[BTreeMap<String, String>]) -> Result<()> {
        let tmp = self.path.with_extension("csv.tmp");
        {
            let mut writer = csv::Writer::from_path(&tmp)?;
            writer.write_record(header)?;
            write_records(&mut writer, header, records)?;
            writer.flush()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Header and rows of the current table, if there is one
    fn existing_records(&self) -> Result<Option<(Vec<String>, Vec<BTreeMap<String, String>>)>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let mut reader = csv::Reader::from_path(&self.path)?;
        let header: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let mut records = Vec::new();
        for record in reader.records() {
            let record = record?;
            records.push(
                header
                    .iter()
                    .cloned()
                    .zip(record.iter().map(str::to_string))
                    .collect(),
            );
        }
        Ok(Some((header, records)))
    }
}

/// Sorted union of field names across all records
pub fn union_header(records: &[BTreeMap<String, String>]) -> Vec<String> {
    records
        .iter()
        .flat_map(|r| r.keys().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn write_records<W: std::io::Write>(
    writer: &mut csv::Writer<W>,
    header: &[String],
    records: &[BTreeMap<String, String>],
) -> Result<()> {
    for record in records {
        let cells = header
            .iter()
            .map(|field| record.get(field).map(String::as_str).unwrap_or(""));
        writer.write_record(cells)?;
    }
    Ok(())
}

/// SHA-256 of a file's contents, hex-encoded
pub fn file_checksum(path: &Path) -> Result<String> {
    let mut file = File::open(path)
        .map_err(|e| PagefoldError::Output(format!("{}: {e}", path.display())))?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

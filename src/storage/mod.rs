use crate::models::TableRecord;
use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

/// Serializes one session's records as a delimited text file: a fixed
/// column header, then one row per record. Each run overwrites the file.
pub struct TableWriter {
    path: PathBuf,
    columns: Vec<String>,
    delimiter: u8,
}

impl TableWriter {
    pub fn new(path: impl Into<PathBuf>, columns: &[&str]) -> Self {
        Self {
            path: path.into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            delimiter: b';',
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes header + records. A record whose field count differs from
    /// the column list is a caller contract violation and fails the run.
    pub fn write<R: TableRecord>(&self, records: &[R]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Could not create dir {:?}", parent))?;
            }
        }

        let mut writer = csv::WriterBuilder::new()
            .delimiter(self.delimiter)
            .from_path(&self.path)
            .with_context(|| format!("Cannot open {:?} for writing", self.path))?;

        writer.write_record(&self.columns)?;

        for record in records {
            let row = record.fields();
            if row.len() != self.columns.len() {
                bail!(
                    "record has {} fields but the table has {} columns",
                    row.len(),
                    self.columns.len()
                );
            }
            writer.write_record(&row)?;
        }

        writer
            .flush()
            .with_context(|| format!("Flush failed for {:?}", self.path))?;
        info!("{:?}: {} rows written", self.path, records.len());
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

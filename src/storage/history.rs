//! Append-only price history log.
//!
//! One row per observation: every pending position re-checked in a cycle,
//! plus every position opened in it. Rows are never rewritten.

use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::types::HistoryRecord;

pub const HISTORY_COLUMNS: [&str; 5] = ["timestamp", "ticker", "yes_bid", "yes_ask", "status"];

pub struct HistoryRecorder {
    path: PathBuf,
}

impl HistoryRecorder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `records` to the log, writing the header first if the file
    /// is new or empty. A no-op for an empty slice.
    pub fn append(&self, records: &[HistoryRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create directory {}", dir.display()))?;
        }

        let needs_header = fs::metadata(&self.path).map(|m| m.len() == 0).unwrap_or(true);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open history {}", self.path.display()))?;

        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        if needs_header {
            writer.write_record(HISTORY_COLUMNS)?;
        }
        for record in records {
            writer.serialize(record)?;
        }
        writer
            .flush()
            .with_context(|| format!("Failed to flush history {}", self.path.display()))?;

        debug!(path = %self.path.display(), rows = records.len(), "History appended");
        Ok(())
    }

    /// Read every row back. A missing file reads as empty.
    pub fn read_all(&self) -> Result<Vec<HistoryRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = csv::Reader::from_path(&self.path)
            .with_context(|| format!("Failed to open history {}", self.path.display()))?;
        reader
            .deserialize()
            .collect::<Result<Vec<HistoryRecord>, _>>()
            .with_context(|| format!("Failed to parse history {}", self.path.display()))
    }
}

//! Persistence layer.
//!
//! The ledger is a CSV file with one row per position. It is loaded whole
//! at the start of a cycle and rewritten whole at the end: the new content
//! goes to a sibling `.tmp` file which is then renamed over the old one, so
//! a crash mid-cycle leaves the previous ledger intact.
//!
//! Loading is strict. A file that exists but cannot be parsed is an error,
//! never an empty ledger.

pub mod compat;
pub mod history;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::types::{ChalkError, Position, PositionLedger, PositionStatus, Side};

/// Column order of the ledger file.
pub const LEDGER_COLUMNS: [&str; 11] = [
    "ticker",
    "question",
    "side",
    "entry_cost",
    "current_valuation",
    "status",
    "opened_at",
    "closed_at",
    "settlement_result",
    "realized_pnl",
    "scheduled_close",
];

/// One ledger row as stored on disk. Columns added after the first schema
/// are optional so older files still load, and the earlier tracker's
/// column names are accepted as aliases.
#[derive(Debug, Serialize, Deserialize)]
struct LedgerRow {
    ticker: String,
    question: String,
    #[serde(alias = "fav_side")]
    side: Side,
    #[serde(deserialize_with = "compat::cents")]
    entry_cost: u32,
    #[serde(default, alias = "current_price", deserialize_with = "compat::opt_cents")]
    current_valuation: Option<u32>,
    status: PositionStatus,
    #[serde(alias = "open_date", deserialize_with = "compat::timestamp")]
    opened_at: DateTime<Utc>,
    #[serde(default, deserialize_with = "compat::opt_timestamp")]
    closed_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "result")]
    settlement_result: Option<Side>,
    #[serde(default, alias = "pnl", deserialize_with = "compat::opt_whole")]
    realized_pnl: Option<i64>,
    #[serde(default, alias = "close_date", deserialize_with = "compat::opt_timestamp")]
    scheduled_close: Option<DateTime<Utc>>,
}

impl From<LedgerRow> for Position {
    fn from(row: LedgerRow) -> Self {
        // The earlier tracker wrote a 0 placeholder P&L on open rows.
        let realized_pnl = match row.realized_pnl {
            Some(0) if row.status != PositionStatus::Settled => None,
            pnl => pnl,
        };
        Self {
            current_valuation: row.current_valuation.unwrap_or(row.entry_cost),
            id: row.ticker,
            question: row.question,
            side: row.side,
            entry_cost: row.entry_cost,
            status: row.status,
            opened_at: row.opened_at,
            closed_at: row.closed_at,
            settlement_result: row.settlement_result,
            realized_pnl,
            scheduled_close: row.scheduled_close,
        }
    }
}

impl From<&Position> for LedgerRow {
    fn from(p: &Position) -> Self {
        Self {
            ticker: p.id.clone(),
            question: p.question.clone(),
            side: p.side,
            entry_cost: p.entry_cost,
            current_valuation: Some(p.current_valuation),
            status: p.status,
            opened_at: p.opened_at,
            closed_at: p.closed_at,
            settlement_result: p.settlement_result,
            realized_pnl: p.realized_pnl,
            scheduled_close: p.scheduled_close,
        }
    }
}

/// Load the ledger from `path`. A missing file is a first run and yields
/// an empty ledger.
pub fn load_ledger(path: impl AsRef<Path>) -> Result<PositionLedger> {
    let path = path.as_ref();

    if !path.exists() {
        info!(path = %path.display(), "No ledger found, starting fresh");
        return Ok(PositionLedger::new());
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::Headers)
        .from_path(path)
        .with_context(|| format!("Failed to open ledger {}", path.display()))?;

    let mut positions = Vec::new();
    for (i, row) in reader.deserialize::<LedgerRow>().enumerate() {
        // Header is line 1.
        let row = row.with_context(|| {
            format!("Failed to parse ledger {} at line {}", path.display(), i + 2)
        })?;
        positions.push(Position::from(row));
    }

    let ledger = PositionLedger::from_positions(positions)
        .with_context(|| format!("Ledger {} failed validation", path.display()))?;

    info!(
        path = %path.display(),
        positions = ledger.len(),
        pending = ledger.pending_ids().len(),
        "Ledger loaded from disk"
    );

    Ok(ledger)
}

/// Write the whole ledger to `path`, replacing the previous file atomically.
pub fn save_ledger(ledger: &PositionLedger, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let tmp = tmp_path(path);

    write_rows(ledger, &tmp)
        .with_context(|| format!("Failed to write ledger to {}", tmp.display()))?;

    fs::rename(&tmp, path).with_context(|| {
        format!("Failed to move {} over {}", tmp.display(), path.display())
    })?;

    debug!(path = %path.display(), positions = ledger.len(), "Ledger saved");
    Ok(())
}

fn write_rows(ledger: &PositionLedger, tmp: &Path) -> Result<()> {
    if let Some(dir) = tmp.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory {}", dir.display()))?;
    }

    let file = File::create(tmp)?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);

    // Always write the header so an empty ledger is still schema-initialised.
    writer.write_record(LEDGER_COLUMNS)?;
    for position in ledger.iter() {
        writer.serialize(LedgerRow::from(position))?;
    }

    let file = writer
        .into_inner()
        .map_err(|e| ChalkError::Storage(format!("flush failed: {}", e.error())))?;
    file.sync_all()?;
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

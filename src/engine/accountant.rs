//! Accountant: per-cycle tallies and ledger-wide P&L.
//!
//! Everything is tracked in integer cents per contract; `rust_decimal` is
//! only used to render dollar figures.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tracing::info;
use uuid::Uuid;

use crate::engine::resolver::ResolutionOutcome;
use crate::strategy::{Rejection, ScanOutcome};
use crate::types::{PositionLedger, PositionStatus};

/// Render a cent amount as dollars, e.g. `-87` as `-0.87`.
pub fn cents_to_dollars(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

// ---------------------------------------------------------------------------
// Ledger summary
// ---------------------------------------------------------------------------

/// Counts and cumulative P&L across the whole ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerSummary {
    pub open: usize,
    pub settled: usize,
    pub void: usize,
    pub won: usize,
    pub lost: usize,
    /// Sum of realized P&L over every settled position.
    pub realized_pnl_cents: i64,
    /// Sum of `current_valuation - entry_cost` over open positions.
    pub open_pnl_cents: i64,
}

impl From<&PositionLedger> for LedgerSummary {
    fn from(ledger: &PositionLedger) -> Self {
        let mut summary = Self::default();
        for p in ledger.iter() {
            match p.status {
                PositionStatus::Pending => {
                    summary.open += 1;
                    summary.open_pnl_cents += p.unrealized_pnl();
                }
                PositionStatus::Void => summary.void += 1,
                PositionStatus::Settled => {
                    summary.settled += 1;
                    summary.realized_pnl_cents += p.realized_pnl.unwrap_or(0);
                    if p.settlement_result == Some(p.side) {
                        summary.won += 1;
                    } else {
                        summary.lost += 1;
                    }
                }
            }
        }
        summary
    }
}

impl LedgerSummary {
    /// Fraction of settled positions that won, `None` before any settle.
    pub fn win_rate(&self) -> Option<Decimal> {
        if self.settled == 0 {
            return None;
        }
        Some((Decimal::from(self.won) / Decimal::from(self.settled)).round_dp(4))
    }

    pub fn realized_dollars(&self) -> Decimal {
        cents_to_dollars(self.realized_pnl_cents)
    }

    pub fn open_dollars(&self) -> Decimal {
        cents_to_dollars(self.open_pnl_cents)
    }
}

// ---------------------------------------------------------------------------
// Cycle report
// ---------------------------------------------------------------------------

/// Summary of one resolve, scan and select cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub run_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub positions_checked: usize,
    pub settled: usize,
    pub voided: usize,
    pub unreachable: usize,
    pub markets_scanned: usize,
    pub new_positions: usize,
    pub rejections: BTreeMap<Rejection, usize>,
    /// Paper P&L of the positions observed this cycle that are still open.
    pub unrealized_pnl_cents: i64,
    /// P&L booked by settlements in this cycle.
    pub realized_pnl_cents: i64,
    pub summary: LedgerSummary,
}

/// Accumulates resolution outcomes as the cycle walks its pending positions.
#[derive(Debug, Default)]
pub struct ResolutionTally {
    pub checked: usize,
    pub settled: usize,
    pub voided: usize,
    pub unreachable: usize,
    pub realized_pnl_cents: i64,
    pub unrealized_pnl_cents: i64,
}

impl ResolutionTally {
    /// Record one outcome. `open_pnl` is the position's unrealized P&L
    /// after the update, counted only while it stays open.
    pub fn record(&mut self, outcome: ResolutionOutcome, open_pnl: i64) {
        match outcome {
            ResolutionOutcome::AlreadyClosed => return,
            ResolutionOutcome::Unreachable => self.unreachable += 1,
            ResolutionOutcome::Open => self.unrealized_pnl_cents += open_pnl,
            ResolutionOutcome::Settled { pnl, .. } => {
                self.settled += 1;
                self.realized_pnl_cents += pnl;
            }
            ResolutionOutcome::Void => self.voided += 1,
        }
        self.checked += 1;
    }
}

pub struct Accountant;

impl Accountant {
    /// Close the books on a cycle and log the result.
    pub fn reconcile(
        timestamp: DateTime<Utc>,
        tally: ResolutionTally,
        markets_scanned: usize,
        scan: &ScanOutcome,
        ledger: &PositionLedger,
    ) -> CycleReport {
        let report = CycleReport {
            run_id: Uuid::new_v4(),
            timestamp,
            positions_checked: tally.checked,
            settled: tally.settled,
            voided: tally.voided,
            unreachable: tally.unreachable,
            markets_scanned,
            new_positions: scan.accepted.len(),
            rejections: scan.rejected.clone(),
            unrealized_pnl_cents: tally.unrealized_pnl_cents,
            realized_pnl_cents: tally.realized_pnl_cents,
            summary: LedgerSummary::from(ledger),
        };

        info!(
            run_id = %report.run_id,
            checked = report.positions_checked,
            settled = report.settled,
            new = report.new_positions,
            open_pnl = format!("${:.2}", cents_to_dollars(report.unrealized_pnl_cents)),
            realized = format!("${:.2}", cents_to_dollars(report.realized_pnl_cents)),
            "Cycle reconciled"
        );

        report
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

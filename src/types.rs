//! Shared types for the CHALK tracker.
//!
//! These types form the data model used across all modules: market
//! snapshots coming off the venue, paper positions and the ledger that
//! holds them, and the history rows appended each cycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Prices are integer cents on a 0–100 scale.
pub const MAX_PRICE_CENTS: u32 = 100;

// ---------------------------------------------------------------------------
// Market snapshot
// ---------------------------------------------------------------------------

/// A binary market as observed on the venue at one point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketSnapshot {
    /// Venue ticker, globally unique per market.
    pub id: String,
    pub title: String,
    /// Best YES bid in cents (0–100).
    pub yes_bid: Option<u32>,
    /// Best YES ask in cents (0–100).
    pub yes_ask: Option<u32>,
    pub status: MarketStatus,
    pub close_time: Option<DateTime<Utc>>,
    /// Settlement outcome, absent until the venue publishes one.
    pub result: Option<MarketResult>,
    pub category: Option<String>,
    pub volume: Option<i64>,
    pub open_interest: Option<i64>,
}

impl fmt::Display for MarketSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cents = |p: Option<u32>| p.map_or_else(|| "-".to_string(), |v| format!("{v}¢"));
        write!(
            f,
            "[{}] {} (bid: {} | ask: {} | {})",
            self.id,
            self.title,
            cents(self.yes_bid),
            cents(self.yes_ask),
            self.status,
        )
    }
}

impl MarketSnapshot {
    /// Whether the venue reports the market as concluded.
    pub fn is_settled(&self) -> bool {
        self.status == MarketStatus::Settled
    }

    /// Helper to build a test/sample snapshot with sensible defaults.
    #[cfg(test)]
    pub fn sample(id: &str, yes_bid: u32, yes_ask: u32) -> Self {
        MarketSnapshot {
            id: id.to_string(),
            title: format!("Will {id} resolve YES?"),
            yes_bid: Some(yes_bid),
            yes_ask: Some(yes_ask),
            status: MarketStatus::Active,
            close_time: Some(Utc::now() + chrono::Duration::hours(10)),
            result: None,
            category: Some("Economics".to_string()),
            volume: Some(1_200),
            open_interest: Some(800),
        }
    }
}

/// Market lifecycle status as reported by the venue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarketStatus {
    Open,
    Active,
    Closed,
    Settled,
    Other(String),
}

impl From<&str> for MarketStatus {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "open" => MarketStatus::Open,
            "active" => MarketStatus::Active,
            "closed" => MarketStatus::Closed,
            // Newer API revisions report settled markets as "finalized".
            "settled" | "finalized" => MarketStatus::Settled,
            _ => MarketStatus::Other(s.to_string()),
        }
    }
}

impl fmt::Display for MarketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketStatus::Open => write!(f, "open"),
            MarketStatus::Active => write!(f, "active"),
            MarketStatus::Closed => write!(f, "closed"),
            MarketStatus::Settled => write!(f, "settled"),
            MarketStatus::Other(s) => write!(f, "{s}"),
        }
    }
}

/// Settlement outcome published by the venue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarketResult {
    Yes,
    No,
    /// Anything other than a clean yes/no (void, cancelled, scalar...).
    Other(String),
}

impl MarketResult {
    /// Parse a raw result string. Empty means "not settled yet".
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(match trimmed.to_lowercase().as_str() {
            "yes" => MarketResult::Yes,
            "no" => MarketResult::No,
            _ => MarketResult::Other(trimmed.to_string()),
        })
    }

    /// The winning side, if the result is a definitive yes/no.
    pub fn winning_side(&self) -> Option<Side> {
        match self {
            MarketResult::Yes => Some(Side::Yes),
            MarketResult::No => Some(Side::No),
            MarketResult::Other(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Contract side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Yes,
    No,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Yes => write!(f, "YES"),
            Side::No => write!(f, "NO"),
        }
    }
}

/// Position lifecycle. Transitions only ever leave `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionStatus {
    Pending,
    Settled,
    /// Market concluded without a yes/no outcome.
    Void,
}

impl PositionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PositionStatus::Pending)
    }
}

impl fmt::Display for PositionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionStatus::Pending => write!(f, "PENDING"),
            PositionStatus::Settled => write!(f, "SETTLED"),
            PositionStatus::Void => write!(f, "VOID"),
        }
    }
}

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

/// A paper position on one market.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub id: String,
    pub question: String,
    pub side: Side,
    /// Simulated per-contract purchase price in cents.
    pub entry_cost: u32,
    /// Last observed exit value in cents. Frozen once terminal.
    pub current_valuation: u32,
    pub status: PositionStatus,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub settlement_result: Option<Side>,
    pub realized_pnl: Option<i64>,
    /// Market close time as listed when the position was opened.
    pub scheduled_close: Option<DateTime<Utc>>,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pnl = self.realized_pnl.unwrap_or_else(|| self.unrealized_pnl());
        write!(
            f,
            "[{}] {} {} entry={}¢ val={}¢ ({pnl:+}¢) {}",
            self.status, self.side, self.id, self.entry_cost, self.current_valuation,
            self.question,
        )
    }
}

impl Position {
    /// Open a fresh PENDING position valued at its entry cost.
    pub fn open(
        id: impl Into<String>,
        question: impl Into<String>,
        side: Side,
        entry_cost: u32,
        opened_at: DateTime<Utc>,
        scheduled_close: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id: id.into(),
            question: question.into(),
            side,
            entry_cost,
            current_valuation: entry_cost,
            status: PositionStatus::Pending,
            opened_at,
            closed_at: None,
            settlement_result: None,
            realized_pnl: None,
            scheduled_close,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == PositionStatus::Pending
    }

    /// Paper P&L at the current valuation, before fees.
    pub fn unrealized_pnl(&self) -> i64 {
        i64::from(self.current_valuation) - i64::from(self.entry_cost)
    }

    /// Realized P&L for a given winning side: payout of 100¢ on a win,
    /// nothing on a loss, minus the per-contract fee either way.
    pub fn pnl_for(&self, winner: Side, fee_cents: u32) -> i64 {
        let entry = i64::from(self.entry_cost);
        let fee = i64::from(fee_cents);
        if winner == self.side {
            (i64::from(MAX_PRICE_CENTS) - entry) - fee
        } else {
            -entry - fee
        }
    }

    /// Record a fresh valuation. Ignored once the position is terminal.
    pub fn revalue(&mut self, valuation: u32) {
        if self.is_pending() {
            self.current_valuation = valuation.min(MAX_PRICE_CENTS);
        }
    }

    /// PENDING → SETTLED with the realized P&L booked.
    pub fn settle(
        &mut self,
        winner: Side,
        fee_cents: u32,
        now: DateTime<Utc>,
    ) -> Result<i64, ChalkError> {
        self.ensure_pending(PositionStatus::Settled)?;
        let pnl = self.pnl_for(winner, fee_cents);
        self.status = PositionStatus::Settled;
        self.settlement_result = Some(winner);
        self.realized_pnl = Some(pnl);
        self.closed_at = Some(now);
        Ok(pnl)
    }

    /// PENDING → VOID. No result and no P&L are recorded.
    pub fn void(&mut self, now: DateTime<Utc>) -> Result<(), ChalkError> {
        self.ensure_pending(PositionStatus::Void)?;
        self.status = PositionStatus::Void;
        self.closed_at = Some(now);
        Ok(())
    }

    fn ensure_pending(&self, to: PositionStatus) -> Result<(), ChalkError> {
        if self.is_pending() {
            Ok(())
        } else {
            Err(ChalkError::InvalidTransition {
                id: self.id.clone(),
                from: self.status,
                to,
            })
        }
    }

    /// Check the status/result/P&L coupling.
    pub fn validate(&self) -> Result<(), ChalkError> {
        let corrupt = |reason: &str| ChalkError::CorruptLedger(format!("{}: {reason}", self.id));

        if self.entry_cost == 0 || self.entry_cost > MAX_PRICE_CENTS {
            return Err(corrupt("entry cost outside 1..=100"));
        }
        let booked = self.settlement_result.is_some() && self.realized_pnl.is_some();
        let clear = self.settlement_result.is_none() && self.realized_pnl.is_none();
        match self.status {
            PositionStatus::Settled if !booked => {
                Err(corrupt("settled without result and P&L"))
            }
            PositionStatus::Pending | PositionStatus::Void if !clear => {
                Err(corrupt("result or P&L recorded on an unsettled position"))
            }
            _ => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// All tracked positions, in the order they were opened.
#[derive(Debug, Clone, Default)]
pub struct PositionLedger {
    positions: Vec<Position>,
    index: HashMap<String, usize>,
}

impl PositionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a ledger from loaded rows, enforcing unique ids and invariants.
    pub fn from_positions(positions: Vec<Position>) -> Result<Self, ChalkError> {
        let mut ledger = Self::new();
        for position in positions {
            position.validate()?;
            ledger.append(position)?;
        }
        Ok(ledger)
    }

    /// Append a new position. Duplicate ids are refused.
    pub fn append(&mut self, position: Position) -> Result<(), ChalkError> {
        if self.index.contains_key(&position.id) {
            return Err(ChalkError::DuplicatePosition(position.id));
        }
        self.index.insert(position.id.clone(), self.positions.len());
        self.positions.push(position);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Position> {
        self.index.get(id).map(|&i| &self.positions[i])
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Position> {
        self.index.get(id).map(|&i| &mut self.positions[i])
    }

    /// Every id in the ledger, whatever its status.
    pub fn tracked_ids(&self) -> HashSet<String> {
        self.index.keys().cloned().collect()
    }

    /// Ids of positions still awaiting settlement, in ledger order.
    pub fn pending_ids(&self) -> Vec<String> {
        self.positions
            .iter()
            .filter(|p| p.is_pending())
            .map(|p| p.id.clone())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Position> {
        self.positions.iter()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

/// One price observation, appended to the history log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    #[serde(deserialize_with = "crate::storage::compat::timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "ticker")]
    pub id: String,
    #[serde(default, deserialize_with = "crate::storage::compat::opt_cents")]
    pub yes_bid: Option<u32>,
    #[serde(default, deserialize_with = "crate::storage::compat::opt_cents")]
    pub yes_ask: Option<u32>,
    pub status: String,
}

impl HistoryRecord {
    /// Record the raw quote of a snapshot under an explicit status label.
    pub fn observe(snapshot: &MarketSnapshot, status: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            timestamp: at,
            id: snapshot.id.clone(),
            yes_bid: snapshot.yes_bid,
            yes_ask: snapshot.yes_ask,
            status: status.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for CHALK.
#[derive(Debug, thiserror::Error)]
pub enum ChalkError {
    #[error("Position already tracked: {0}")]
    DuplicatePosition(String),

    #[error("Invalid transition for {id}: {from} -> {to}")]
    InvalidTransition {
        id: String,
        from: PositionStatus,
        to: PositionStatus,
    },

    #[error("Corrupt ledger: {0}")]
    CorruptLedger(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

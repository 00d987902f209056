//! Settlement resolver.
//!
//! Re-queries each pending position's market, refreshes its valuation and
//! closes it out once the venue reports a settlement.
//!
//! Valuation is what the holder could exit for: the YES bid for a YES
//! position, and `100 - yes_ask` for a NO position. The NO figure is a
//! proxy for the NO bid derived from the YES book, not a quote.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::config::StrategyConfig;
use crate::platforms::MarketVenue;
use crate::types::{
    HistoryRecord, MarketResult, MarketSnapshot, Position, Side, MAX_PRICE_CENTS,
};

#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Per-contract taker fee in cents.
    pub fee_cents: u32,
    /// Close markets that settle without yes/no as VOID instead of leaving
    /// them pending.
    pub settle_void_markets: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self::from(&StrategyConfig::default())
    }
}

impl From<&StrategyConfig> for ResolverConfig {
    fn from(cfg: &StrategyConfig) -> Self {
        Self {
            fee_cents: cfg.fee_cents,
            settle_void_markets: cfg.settle_void_markets,
        }
    }
}

/// What happened to one position this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionOutcome {
    /// Market could not be fetched; position untouched.
    Unreachable,
    /// Position was already terminal; nothing fetched.
    AlreadyClosed,
    /// Revalued, still open.
    Open,
    Settled { won: bool, pnl: i64 },
    Void,
}

#[derive(Debug, Clone)]
pub struct Resolution {
    pub position: Position,
    pub observation: Option<HistoryRecord>,
    pub outcome: ResolutionOutcome,
}

pub struct SettlementResolver {
    config: ResolverConfig,
}

impl SettlementResolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    /// Exit value of `side` given the YES book, if the needed quote exists.
    pub fn valuation(side: Side, snapshot: &MarketSnapshot) -> Option<u32> {
        match side {
            Side::Yes => snapshot.yes_bid,
            Side::No => snapshot
                .yes_ask
                .map(|ask| MAX_PRICE_CENTS.saturating_sub(ask)),
        }
    }

    /// Fetch the position's market and apply it.
    pub async fn resolve(
        &self,
        venue: &dyn MarketVenue,
        position: &Position,
        now: DateTime<Utc>,
    ) -> Resolution {
        if position.status.is_terminal() {
            return Resolution {
                position: position.clone(),
                observation: None,
                outcome: ResolutionOutcome::AlreadyClosed,
            };
        }

        match venue.get_market(&position.id).await {
            Some(snapshot) => self.apply_snapshot(position, &snapshot, now),
            None => {
                debug!(ticker = %position.id, "Market unavailable, retrying next cycle");
                Resolution {
                    position: position.clone(),
                    observation: None,
                    outcome: ResolutionOutcome::Unreachable,
                }
            }
        }
    }

    /// Apply a fresh snapshot to a pending position.
    pub fn apply_snapshot(
        &self,
        position: &Position,
        snapshot: &MarketSnapshot,
        now: DateTime<Utc>,
    ) -> Resolution {
        let mut updated = position.clone();
        let observation = HistoryRecord::observe(snapshot, snapshot.status.to_string(), now);

        match Self::valuation(updated.side, snapshot) {
            Some(value) => updated.revalue(value),
            None => debug!(ticker = %updated.id, "No quote for valuation, keeping last"),
        }

        info!(
            ticker = %updated.id,
            pnl = format!("{:+}¢", updated.unrealized_pnl()),
            price = updated.current_valuation,
            status = %snapshot.status,
            "Position updated"
        );

        let outcome = if snapshot.is_settled() {
            self.settle(&mut updated, snapshot.result.as_ref(), now)
        } else {
            ResolutionOutcome::Open
        };

        Resolution {
            position: updated,
            observation: Some(observation),
            outcome,
        }
    }

    fn settle(
        &self,
        position: &mut Position,
        result: Option<&MarketResult>,
        now: DateTime<Utc>,
    ) -> ResolutionOutcome {
        let Some(result) = result else {
            debug!(ticker = %position.id, "Settled without a published result yet");
            return ResolutionOutcome::Open;
        };

        match result.winning_side() {
            Some(winner) => match position.settle(winner, self.config.fee_cents, now) {
                Ok(pnl) => {
                    info!(ticker = %position.id, winner = %winner, pnl, "SETTLED");
                    ResolutionOutcome::Settled {
                        won: winner == position.side,
                        pnl,
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Settlement refused");
                    ResolutionOutcome::Open
                }
            },
            None if self.config.settle_void_markets => match position.void(now) {
                Ok(()) => {
                    info!(ticker = %position.id, result = ?result, "VOID");
                    ResolutionOutcome::Void
                }
                Err(e) => {
                    warn!(error = %e, "Void refused");
                    ResolutionOutcome::Open
                }
            },
            None => {
                warn!(ticker = %position.id, result = ?result, "Non-binary settlement left pending");
                ResolutionOutcome::Open
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

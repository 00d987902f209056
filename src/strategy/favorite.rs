//! Heavy-favorite selection.
//!
//! Decides whether a market snapshot becomes a tracked paper position,
//! which side is the favorite and what the entry costs. Pure: the same
//! inputs always give the same answer.

use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use tracing::{debug, info};

use crate::config::StrategyConfig;
use crate::types::{MarketSnapshot, Position, Side, MAX_PRICE_CENTS};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Cap on the configured lookahead (a century) so the window stays finite.
const MAX_HORIZON_HOURS: u64 = 24 * 365 * 100;

#[derive(Debug, Clone)]
pub struct SelectorConfig {
    /// Favorite threshold in cents.
    pub min_probability: u32,
    pub min_accepted_cost: u32,
    pub max_accepted_cost: Option<u32>,
    /// Close-time lookahead; `None` disables the window check.
    pub horizon: Option<Duration>,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self::from(&StrategyConfig::default())
    }
}

impl From<&StrategyConfig> for SelectorConfig {
    fn from(cfg: &StrategyConfig) -> Self {
        Self {
            min_probability: cfg.min_probability,
            min_accepted_cost: cfg.min_accepted_cost,
            max_accepted_cost: cfg.max_accepted_cost,
            horizon: cfg
                .horizon_hours
                .map(|h| Duration::hours(h.min(MAX_HORIZON_HOURS) as i64)),
        }
    }
}

// ---------------------------------------------------------------------------
// Rejections
// ---------------------------------------------------------------------------

/// Why a snapshot did not become a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Rejection {
    AlreadyTracked,
    MissingCloseTime,
    OutsideHorizon,
    MissingPrice,
    NoFavorite,
    CostOutsideBand,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Rejection::AlreadyTracked => "already tracked",
            Rejection::MissingCloseTime => "missing close time",
            Rejection::OutsideHorizon => "outside horizon",
            Rejection::MissingPrice => "missing price",
            Rejection::NoFavorite => "no favorite",
            Rejection::CostOutsideBand => "cost outside band",
        };
        write!(f, "{s}")
    }
}

/// Outcome of running the selector across a whole listing.
#[derive(Debug, Clone, Default)]
pub struct ScanOutcome {
    pub accepted: Vec<Position>,
    pub rejected: BTreeMap<Rejection, usize>,
}

impl ScanOutcome {
    pub fn rejected_total(&self) -> usize {
        self.rejected.values().sum()
    }
}

// ---------------------------------------------------------------------------
// Selector
// ---------------------------------------------------------------------------

pub struct FavoriteSelector {
    config: SelectorConfig,
}

impl FavoriteSelector {
    pub fn new(config: SelectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SelectorConfig {
        &self.config
    }

    /// Pick the favored side and its entry cost from the YES quote.
    ///
    /// YES is favored when the bid clears the threshold and costs the ask.
    /// NO is favored when the bid is at or below `100 - threshold` and costs
    /// `100 - bid`.
    pub fn favorite(&self, snapshot: &MarketSnapshot) -> Result<(Side, u32), Rejection> {
        let bid = snapshot.yes_bid.ok_or(Rejection::MissingPrice)?;
        let threshold = self.config.min_probability;

        if bid >= threshold {
            let ask = snapshot.yes_ask.ok_or(Rejection::MissingPrice)?;
            Ok((Side::Yes, ask))
        } else if bid <= MAX_PRICE_CENTS.saturating_sub(threshold) {
            Ok((Side::No, MAX_PRICE_CENTS - bid))
        } else {
            Err(Rejection::NoFavorite)
        }
    }

    fn in_band(&self, cost: u32) -> bool {
        cost > 0
            && cost <= MAX_PRICE_CENTS
            && cost >= self.config.min_accepted_cost
            && self.config.max_accepted_cost.map_or(true, |max| cost <= max)
    }

    /// Decide whether `snapshot` becomes a new PENDING position.
    pub fn evaluate(
        &self,
        snapshot: &MarketSnapshot,
        already_tracked: &HashSet<String>,
        now: DateTime<Utc>,
    ) -> Result<Position, Rejection> {
        if already_tracked.contains(&snapshot.id) {
            return Err(Rejection::AlreadyTracked);
        }

        let close = snapshot.close_time.ok_or(Rejection::MissingCloseTime)?;
        if let Some(horizon) = self.config.horizon {
            if close < now || close > now + horizon {
                return Err(Rejection::OutsideHorizon);
            }
        }

        let (side, cost) = self.favorite(snapshot)?;
        if !self.in_band(cost) {
            return Err(Rejection::CostOutsideBand);
        }

        Ok(Position::open(
            snapshot.id.clone(),
            snapshot.title.clone(),
            side,
            cost,
            now,
            Some(close),
        ))
    }

    /// Run `evaluate` over a listing. Accepted ids join the tracked set as
    /// we go, so a ticker listed twice is only opened once.
    pub fn scan(
        &self,
        markets: &[MarketSnapshot],
        tracked: &HashSet<String>,
        now: DateTime<Utc>,
    ) -> ScanOutcome {
        let mut tracked = tracked.clone();
        let mut outcome = ScanOutcome::default();

        for market in markets {
            match self.evaluate(market, &tracked, now) {
                Ok(position) => {
                    info!(
                        ticker = %position.id,
                        side = %position.side,
                        cost = position.entry_cost,
                        question = %truncate(&position.question, 40),
                        "New trade found"
                    );
                    tracked.insert(position.id.clone());
                    outcome.accepted.push(position);
                }
                Err(reason) => {
                    debug!(ticker = %market.id, reason = %reason, "Skipped");
                    *outcome.rejected.entry(reason).or_default() += 1;
                }
            }
        }

        outcome
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((i, _)) => format!("{}...", &s[..i]),
        None => s.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

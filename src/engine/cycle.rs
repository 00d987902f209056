//! Cycle orchestrator: one full resolve, scan, select and persist pass.
//!
//! Order matters. Pending positions are resolved against the ledger as it
//! stood on disk before anything new is opened, so a position is never
//! opened and re-checked in the same cycle. The ledger is saved before the
//! history rows are appended.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::engine::accountant::{Accountant, CycleReport, ResolutionTally};
use crate::engine::resolver::{ResolverConfig, SettlementResolver};
use crate::engine::scanner::{MarketPager, PagerConfig};
use crate::platforms::MarketVenue;
use crate::storage::{self, history::HistoryRecorder};
use crate::strategy::{FavoriteSelector, SelectorConfig};
use crate::types::{HistoryRecord, MarketSnapshot};

/// History status label for a freshly opened position.
const OPENED_STATUS: &str = "active";

pub struct CycleOrchestrator {
    venue: Box<dyn MarketVenue>,
    pager: MarketPager,
    selector: FavoriteSelector,
    resolver: SettlementResolver,
    ledger_path: PathBuf,
    history: HistoryRecorder,
}

impl CycleOrchestrator {
    pub fn new(
        venue: Box<dyn MarketVenue>,
        pager: MarketPager,
        selector: FavoriteSelector,
        resolver: SettlementResolver,
        ledger_path: impl Into<PathBuf>,
        history: HistoryRecorder,
    ) -> Self {
        Self {
            venue,
            pager,
            selector,
            resolver,
            ledger_path: ledger_path.into(),
            history,
        }
    }

    /// Wire every component from the application config.
    pub fn from_config(venue: Box<dyn MarketVenue>, cfg: &AppConfig) -> Self {
        Self::new(
            venue,
            MarketPager::new(PagerConfig::from(&cfg.retry)),
            FavoriteSelector::new(SelectorConfig::from(&cfg.strategy)),
            SettlementResolver::new(ResolverConfig::from(&cfg.strategy)),
            &cfg.storage.ledger_path,
            HistoryRecorder::new(&cfg.storage.history_path),
        )
    }

    /// Run one cycle. Only persistence faults are errors; venue trouble
    /// just makes the cycle do less.
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> Result<CycleReport> {
        let mut ledger = storage::load_ledger(&self.ledger_path)
            .context("Cannot start cycle without a readable ledger")?;
        let mut observations: Vec<HistoryRecord> = Vec::new();

        // 1. Re-check open positions
        let pending = ledger.pending_ids();
        if !pending.is_empty() {
            info!(count = pending.len(), "Checking open positions");
        }

        let mut tally = ResolutionTally::default();
        for id in &pending {
            let Some(position) = ledger.get_mut(id) else {
                continue;
            };
            let resolution = self.resolver.resolve(self.venue.as_ref(), position, now).await;
            tally.record(resolution.outcome, resolution.position.unrealized_pnl());
            *position = resolution.position;
            observations.extend(resolution.observation);
        }

        if !pending.is_empty() {
            info!(
                open_pnl = tally.unrealized_pnl_cents,
                settled = tally.settled,
                unreachable = tally.unreachable,
                "Total paper profit on open positions (cents)"
            );
        }

        // 2. Scan and select
        let markets = self.pager.fetch_all_open_markets(self.venue.as_ref()).await;
        let scan = self.selector.scan(&markets, &ledger.tracked_ids(), now);

        // 3. Open new positions
        let quotes: HashMap<&str, &MarketSnapshot> =
            markets.iter().map(|m| (m.id.as_str(), m)).collect();
        for position in &scan.accepted {
            if let Some(snapshot) = quotes.get(position.id.as_str()) {
                observations.push(HistoryRecord::observe(snapshot, OPENED_STATUS, now));
            }
            match ledger.append(position.clone()) {
                Ok(()) => info!(position = %position, "Opened"),
                Err(e) => warn!(error = %e, "Skipping position"),
            }
        }

        if scan.accepted.is_empty() {
            info!(
                scanned = markets.len(),
                rejected = scan.rejected_total(),
                threshold = self.selector.config().min_probability,
                "No new heavy favorites found"
            );
        } else {
            info!(count = scan.accepted.len(), "Opened new paper positions");
        }

        // 4. Persist
        storage::save_ledger(&ledger, &self.ledger_path)?;
        self.history.append(&observations).with_context(|| {
            format!("Ledger saved but history {} was not updated", self.history.path().display())
        })?;

        Ok(Accountant::reconcile(now, tally, markets.len(), &scan, &ledger))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! End-to-end cycles against the scripted venue and real files on disk.

use chrono::Utc;
use std::fs;
use std::path::PathBuf;

use chalk::config::AppConfig;
use chalk::engine::cycle::CycleOrchestrator;
use chalk::storage::{self, history::HistoryRecorder};
use chalk::strategy::Rejection;
use chalk::types::{PositionStatus, Side};

use crate::mock_venue::ScriptedVenue;

struct Workspace {
    dir: PathBuf,
    cfg: AppConfig,
}

impl Workspace {
    fn new() -> Self {
        let dir = std::env::temp_dir().join(format!("chalk_it_{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        let toml = format!(
            r#"
            [retry]
            page_failure_delay_ms = 0
            page_delay_ms = 0

            [strategy]
            max_accepted_cost = 97
            horizon_hours = 48

            [storage]
            ledger_path = "{}"
            history_path = "{}"
            "#,
            dir.join("ledger.csv").display(),
            dir.join("history.csv").display(),
        );
        let cfg = AppConfig::parse(&toml).unwrap();
        Self { dir, cfg }
    }

    fn orchestrator(&self, venue: &ScriptedVenue) -> CycleOrchestrator {
        CycleOrchestrator::from_config(Box::new(venue.clone()), &self.cfg)
    }

    fn history(&self) -> HistoryRecorder {
        HistoryRecorder::new(&self.cfg.storage.history_path)
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.dir);
    }
}

#[tokio::test]
async fn test_open_then_settle_lifecycle() {
    let ws = Workspace::new();
    let venue = ScriptedVenue::new(2);
    venue.list(ScriptedVenue::market("X", 93, 94, 10));
    venue.list(ScriptedVenue::market("N", 8, 10, 20));
    venue.list(ScriptedVenue::market("COIN", 48, 52, 10));
    venue.list(ScriptedVenue::market("FAR", 95, 96, 24 * 30));
    venue.list(ScriptedVenue::market("PRICEY", 98, 99, 10));

    // Cycle 1: open the two favorites.
    let report = ws.orchestrator(&venue).run_cycle(Utc::now()).await.unwrap();
    assert_eq!(report.markets_scanned, 5);
    assert_eq!(report.new_positions, 2);
    assert_eq!(report.rejections.get(&Rejection::NoFavorite), Some(&1));
    assert_eq!(report.rejections.get(&Rejection::OutsideHorizon), Some(&1));
    assert_eq!(report.rejections.get(&Rejection::CostOutsideBand), Some(&1));
    // Five markets at two per page.
    assert_eq!(venue.list_calls(), 3);

    let ledger = storage::load_ledger(&ws.cfg.storage.ledger_path).unwrap();
    let x = ledger.get("X").unwrap();
    assert_eq!((x.side, x.entry_cost), (Side::Yes, 94));
    let n = ledger.get("N").unwrap();
    assert_eq!((n.side, n.entry_cost), (Side::No, 92));

    // Cycle 2: X settles YES, N moves.
    venue.settle("X", "yes");
    venue.quote("N", 5, 6);
    let report = ws.orchestrator(&venue).run_cycle(Utc::now()).await.unwrap();
    assert_eq!(report.positions_checked, 2);
    assert_eq!(report.settled, 1);
    assert_eq!(report.realized_pnl_cents, 4);
    assert_eq!(report.unrealized_pnl_cents, 2);
    assert_eq!(report.new_positions, 0);
    assert_eq!(report.summary.won, 1);

    let ledger = storage::load_ledger(&ws.cfg.storage.ledger_path).unwrap();
    assert_eq!(ledger.len(), 2);
    let x = ledger.get("X").unwrap();
    assert_eq!(x.status, PositionStatus::Settled);
    assert_eq!(x.settlement_result, Some(Side::Yes));
    assert_eq!(x.realized_pnl, Some(4));
    assert!(x.closed_at.is_some());
    assert_eq!(ledger.get("N").unwrap().current_valuation, 94);

    // Cycle 3: settled positions are not fetched again.
    let calls_before = venue.get_calls();
    ws.orchestrator(&venue).run_cycle(Utc::now()).await.unwrap();
    assert_eq!(venue.get_calls() - calls_before, 1);

    // Two opens, then two observations, then one.
    let history = ws.history().read_all().unwrap();
    assert_eq!(history.len(), 5);
    assert!(history[..2].iter().all(|h| h.status == "active"));
    let x_rows: Vec<_> = history.iter().filter(|h| h.id == "X").collect();
    assert_eq!(x_rows.len(), 2);
    assert_eq!(x_rows[1].status, "settled");
    assert_eq!(history[4].id, "N");
}

#[tokio::test]
async fn test_settled_market_never_reopened() {
    let ws = Workspace::new();
    let venue = ScriptedVenue::new(100);
    venue.list(ScriptedVenue::market("X", 90, 91, 5));

    ws.orchestrator(&venue).run_cycle(Utc::now()).await.unwrap();
    venue.settle("X", "no");
    ws.orchestrator(&venue).run_cycle(Utc::now()).await.unwrap();

    // Relist the same ticker as if it were open again.
    venue.list(ScriptedVenue::market("X", 90, 91, 5));
    let report = ws.orchestrator(&venue).run_cycle(Utc::now()).await.unwrap();
    assert_eq!(report.new_positions, 0);
    assert_eq!(report.rejections.get(&Rejection::AlreadyTracked), Some(&1));

    let ledger = storage::load_ledger(&ws.cfg.storage.ledger_path).unwrap();
    let x = ledger.get("X").unwrap();
    assert_eq!(x.status, PositionStatus::Settled);
    assert_eq!(x.realized_pnl, Some(-93));
}

#[tokio::test]
async fn test_unreachable_positions_stay_pending() {
    let ws = Workspace::new();
    let venue = ScriptedVenue::new(100);
    venue.list(ScriptedVenue::market("X", 90, 91, 5));
    ws.orchestrator(&venue).run_cycle(Utc::now()).await.unwrap();

    venue.settle("X", "yes");
    venue.set_lookups_down(true);
    let report = ws.orchestrator(&venue).run_cycle(Utc::now()).await.unwrap();
    assert_eq!(report.unreachable, 1);
    assert_eq!(report.settled, 0);

    let ledger = storage::load_ledger(&ws.cfg.storage.ledger_path).unwrap();
    assert!(ledger.get("X").unwrap().is_pending());

    // Recovers on the next cycle.
    venue.set_lookups_down(false);
    let report = ws.orchestrator(&venue).run_cycle(Utc::now()).await.unwrap();
    assert_eq!(report.settled, 1);
}

#[tokio::test]
async fn test_void_settlement() {
    let ws = Workspace::new();
    let venue = ScriptedVenue::new(100);
    venue.list(ScriptedVenue::market("X", 90, 91, 5));
    ws.orchestrator(&venue).run_cycle(Utc::now()).await.unwrap();

    venue.settle("X", "void");
    let report = ws.orchestrator(&venue).run_cycle(Utc::now()).await.unwrap();
    assert_eq!(report.voided, 1);
    assert_eq!(report.summary.void, 1);

    let ledger = storage::load_ledger(&ws.cfg.storage.ledger_path).unwrap();
    let x = ledger.get("X").unwrap();
    assert_eq!(x.status, PositionStatus::Void);
    assert!(x.realized_pnl.is_none());
}

#[tokio::test]
async fn test_listing_outage_keeps_existing_positions() {
    let ws = Workspace::new();
    let venue = ScriptedVenue::new(100);
    venue.list(ScriptedVenue::market("X", 90, 91, 5));
    ws.orchestrator(&venue).run_cycle(Utc::now()).await.unwrap();

    venue.set_listing_down(true);
    venue.quote("X", 95, 96);
    let report = ws.orchestrator(&venue).run_cycle(Utc::now()).await.unwrap();
    assert_eq!(report.markets_scanned, 0);
    assert_eq!(report.positions_checked, 1);

    let ledger = storage::load_ledger(&ws.cfg.storage.ledger_path).unwrap();
    assert_eq!(ledger.get("X").unwrap().current_valuation, 95);
}

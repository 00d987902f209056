//! CHALK: heavy-favorite paper trader.
//!
//! Entry point. Loads configuration, initialises structured logging,
//! wires the venue client into the cycle orchestrator and runs either a
//! single cycle or a loop with graceful shutdown.

use anyhow::Result;
use chrono::Utc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use chalk::config;
use chalk::engine::accountant::{cents_to_dollars, CycleReport};
use chalk::engine::cycle::CycleOrchestrator;
use chalk::platforms::fetcher::{HttpFetcher, RateLimitPolicy};
use chalk::platforms::kalshi::KalshiClient;

const BANNER: &str = r#"
  ____ _   _    _    _     _  __
 / ___| | | |  / \  | |   | |/ /
| |   | |_| | / _ \ | |   | ' /
| |___|  _  |/ ___ \| |___| . \
 \____|_| |_/_/   \_\_____|_|\_\

  Heavy-favorite paper trader
  v0.1.0
"#;

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let cfg = config::AppConfig::load(&config_path)?;

    init_logging();

    println!("{BANNER}");
    info!(
        agent_name = %cfg.agent.name,
        venue = %cfg.venue.base_url,
        ledger = %cfg.storage.ledger_path,
        min_probability = cfg.strategy.min_probability,
        "CHALK starting up"
    );

    // -- Initialise components -------------------------------------------

    let fetcher = HttpFetcher::new(&cfg.venue, RateLimitPolicy::from(&cfg.retry))?;
    let venue = KalshiClient::new(&cfg.venue, fetcher);
    let orchestrator = CycleOrchestrator::from_config(Box::new(venue), &cfg);

    // -- Single run ------------------------------------------------------

    let Some(interval_secs) = cfg.agent.interval_secs else {
        let report = orchestrator.run_cycle(Utc::now()).await?;
        log_cycle_report(&report);
        return Ok(());
    };

    // -- Main loop -------------------------------------------------------

    let mut interval = cycle_interval(interval_secs);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(interval_secs, "Entering main loop. Press Ctrl+C to stop.");

    let mut cycles = 0u64;
    loop {
        tokio::select! {
            _ = interval.tick() => {
                match orchestrator.run_cycle(Utc::now()).await {
                    Ok(report) => {
                        cycles += 1;
                        log_cycle_report(&report);
                    }
                    Err(e) => {
                        error!(error = format!("{e:#}"), "Cycle failed, stopping");
                        return Err(e);
                    }
                }
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received.");
                break;
            }
        }
    }

    info!(cycles, "CHALK shut down cleanly.");
    Ok(())
}

/// Cycle ticker. A cycle that overruns pushes the schedule back rather
/// than firing the missed ticks back to back.
fn cycle_interval(secs: u64) -> tokio::time::Interval {
    let mut interval = tokio::time::interval(Duration::from_secs(secs.max(1)));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

/// Log a human-readable cycle summary.
fn log_cycle_report(report: &CycleReport) {
    let s = &report.summary;
    info!(
        run_id = %report.run_id,
        checked = report.positions_checked,
        settled = report.settled,
        voided = report.voided,
        unreachable = report.unreachable,
        scanned = report.markets_scanned,
        opened = report.new_positions,
        rejected = ?report.rejections,
        open_pnl = format!("${:.2}", cents_to_dollars(report.unrealized_pnl_cents)),
        "Cycle complete"
    );
    info!(
        open = s.open,
        won = s.won,
        lost = s.lost,
        void = s.void,
        win_rate = ?s.win_rate(),
        realized = format!("${:.2}", s.realized_dollars()),
        unrealized = format!("${:.2}", s.open_dollars()),
        "Ledger totals"
    );
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("chalk=info"));

    if std::env::var("CHALK_LOG_JSON").is_ok() {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}

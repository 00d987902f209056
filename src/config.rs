//! Configuration loading from TOML.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Every field has a default, so a partial file (or an empty one) is a
//! valid configuration. Values are checked once by [`AppConfig::validate`]
//! and then handed to components by value; nothing reads config globally.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::time::Duration;

use crate::types::{ChalkError, MAX_PRICE_CENTS};

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub agent: AgentConfig,
    pub venue: VenueConfig,
    pub retry: RetryConfig,
    pub strategy: StrategyConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AgentConfig {
    pub name: String,
    /// When set, keep running a cycle every N seconds until Ctrl+C.
    /// When absent, run exactly one cycle and exit.
    pub interval_secs: Option<u64>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: "CHALK-001".to_string(),
            interval_secs: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct VenueConfig {
    pub base_url: String,
    /// Status filter sent to the listing endpoint ("open" or "active").
    pub market_status: String,
    pub page_size: u32,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for VenueConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.elections.kalshi.com/trade-api/v2".to_string(),
            market_status: "open".to_string(),
            page_size: 100,
            timeout_secs: 10,
            user_agent: "CHALK/0.1.0 (paper-tracker)".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after a 429 before the request is given up.
    pub max_rate_limit_retries: u32,
    /// First 429 backoff; doubles on each further retry.
    pub rate_limit_backoff_ms: u64,
    /// Consecutive failed pages tolerated before a scan is cut short.
    pub max_page_failures: u32,
    pub page_failure_delay_ms: u64,
    /// Pause between successful pages.
    pub page_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_rate_limit_retries: 3,
            rate_limit_backoff_ms: 1_000,
            max_page_failures: 3,
            page_failure_delay_ms: 2_000,
            page_delay_ms: 200,
        }
    }
}

impl RetryConfig {
    pub fn rate_limit_backoff(&self) -> Duration {
        Duration::from_millis(self.rate_limit_backoff_ms)
    }

    pub fn page_failure_delay(&self) -> Duration {
        Duration::from_millis(self.page_failure_delay_ms)
    }

    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StrategyConfig {
    /// YES bid (cents) at or above which YES is the favorite; NO is the
    /// favorite when the bid is at or below `100 - min_probability`.
    pub min_probability: u32,
    pub min_accepted_cost: u32,
    /// Upper bound of the cost band; no upper bound when absent.
    pub max_accepted_cost: Option<u32>,
    /// Lookahead window on close time; no window when absent.
    pub horizon_hours: Option<u64>,
    /// Per-contract taker fee in cents, charged on win and loss alike.
    pub fee_cents: u32,
    /// Close out markets that settle without a yes/no result as VOID.
    pub settle_void_markets: bool,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            min_probability: 80,
            min_accepted_cost: 80,
            max_accepted_cost: None,
            horizon_hours: None,
            fee_cents: 2,
            settle_void_markets: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub ledger_path: String,
    pub history_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            ledger_path: "paper_trades.csv".to_string(),
            history_path: "market_history.csv".to_string(),
        }
    }
}

impl AppConfig {
    /// Load and validate configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config = Self::parse(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        Ok(config)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn parse(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make the selector or pager meaningless.
    pub fn validate(&self) -> Result<(), ChalkError> {
        let s = &self.strategy;
        if s.min_probability > MAX_PRICE_CENTS || s.min_probability <= MAX_PRICE_CENTS / 2 {
            return Err(ChalkError::Config(format!(
                "strategy.min_probability must be in 51..=100, got {}",
                s.min_probability
            )));
        }
        if s.min_accepted_cost > MAX_PRICE_CENTS {
            return Err(ChalkError::Config(format!(
                "strategy.min_accepted_cost must be at most 100, got {}",
                s.min_accepted_cost
            )));
        }
        if let Some(max) = s.max_accepted_cost {
            if max > MAX_PRICE_CENTS || max < s.min_accepted_cost {
                return Err(ChalkError::Config(format!(
                    "strategy.max_accepted_cost {max} outside {}..=100",
                    s.min_accepted_cost
                )));
            }
        }
        if self.venue.page_size == 0 {
            return Err(ChalkError::Config("venue.page_size must be positive".into()));
        }
        if self.venue.timeout_secs == 0 {
            return Err(ChalkError::Config("venue.timeout_secs must be positive".into()));
        }
        Ok(())
    }
}

//! Kalshi REST integration (read-only).
//!
//! Lists open binary markets and re-queries single markets for
//! settlement. Prices come back as integer cents.
//!
//! API: `https://api.elections.kalshi.com/trade-api/v2`
//! Auth: Not required for market data.
//! Pagination: cursor-based (`?limit=N&status=open&cursor=C`), max 100 per page;
//! an empty or missing `cursor` marks the last page.
//! Timestamps: RFC 3339 strings (e.g. "2026-02-09T18:00:00Z").

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

use super::fetcher::HttpFetcher;
use super::{MarketPage, MarketVenue};
use crate::config::VenueConfig;
use crate::types::{MarketResult, MarketSnapshot, MarketStatus, MAX_PRICE_CENTS};

/// Longest ticker accepted for a path segment.
const MAX_TICKER_LEN: usize = 128;

// ---------------------------------------------------------------------------
// API response types (Kalshi JSON → Rust)
// ---------------------------------------------------------------------------

/// Response from `GET /markets`. Items stay as raw JSON so one malformed
/// market costs only itself, not the page.
#[derive(Debug, Deserialize)]
struct RawMarketsResponse {
    #[serde(default)]
    markets: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    cursor: Option<String>,
}

/// Response from `GET /markets/{ticker}`.
#[derive(Debug, Deserialize)]
struct RawMarketResponse {
    market: Option<RawMarket>,
}

/// A Kalshi market object. Only the fields we consume.
#[derive(Debug, Deserialize)]
struct RawMarket {
    ticker: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    yes_bid: Option<i64>,
    #[serde(default)]
    yes_ask: Option<i64>,
    #[serde(default)]
    close_time: Option<String>,
    /// "yes" / "no" once settled; empty string before that.
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    volume: Option<i64>,
    #[serde(default)]
    open_interest: Option<i64>,
}

/// Keep a price only if it is on the 0–100 cent scale.
fn cents(raw: Option<i64>) -> Option<u32> {
    raw.and_then(|v| u32::try_from(v).ok())
        .filter(|&v| v <= MAX_PRICE_CENTS)
}

fn parse_close_time(ticker: &str, raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw.filter(|s| !s.trim().is_empty())?;
    match DateTime::parse_from_rfc3339(raw) {
        Ok(dt) => Some(dt.with_timezone(&Utc)),
        Err(e) => {
            debug!(ticker, close_time = raw, error = %e, "Unparsable close time");
            None
        }
    }
}

impl From<RawMarket> for MarketSnapshot {
    fn from(raw: RawMarket) -> Self {
        let close_time = parse_close_time(&raw.ticker, raw.close_time.as_deref());

        Self {
            title: raw.title.unwrap_or_default(),
            yes_bid: cents(raw.yes_bid),
            yes_ask: cents(raw.yes_ask),
            status: raw
                .status
                .as_deref()
                .map(MarketStatus::from)
                .unwrap_or_else(|| MarketStatus::Other(String::new())),
            close_time,
            result: raw.result.as_deref().and_then(MarketResult::parse),
            category: raw.category.filter(|c| !c.is_empty()),
            volume: raw.volume,
            open_interest: raw.open_interest,
            id: raw.ticker,
        }
    }
}

/// Decode one listing item, skipping it if it does not fit `RawMarket`.
fn decode_market(item: serde_json::Value) -> Option<MarketSnapshot> {
    let ticker = item
        .get("ticker")
        .and_then(|t| t.as_str())
        .unwrap_or("<missing>")
        .to_string();
    match serde_json::from_value::<RawMarket>(item) {
        Ok(raw) => Some(MarketSnapshot::from(raw)),
        Err(e) => {
            warn!(ticker, error = %e, "Skipping malformed market");
            None
        }
    }
}

impl From<RawMarketsResponse> for MarketPage {
    fn from(raw: RawMarketsResponse) -> Self {
        Self {
            markets: raw
                .markets
                .unwrap_or_default()
                .into_iter()
                .filter_map(decode_market)
                .collect(),
            cursor: raw.cursor.filter(|c| !c.is_empty()),
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Kalshi market-data client.
pub struct KalshiClient {
    fetcher: HttpFetcher,
    base_url: String,
    market_status: String,
    page_size: u32,
}

impl KalshiClient {
    pub fn new(venue: &VenueConfig, fetcher: HttpFetcher) -> Self {
        Self {
            fetcher,
            base_url: venue.base_url.trim_end_matches('/').to_string(),
            market_status: venue.market_status.clone(),
            page_size: venue.page_size,
        }
    }

    /// Validate a ticker before it becomes a path segment.
    fn validate_ticker(ticker: &str) -> Result<&str> {
        if ticker.is_empty() {
            bail!("Ticker cannot be empty");
        }
        if ticker.len() > MAX_TICKER_LEN {
            bail!("Ticker too long: {} chars", ticker.len());
        }
        if ticker.contains("..") {
            bail!("Ticker contains path traversal: {ticker}");
        }
        if !ticker
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        {
            bail!("Ticker contains invalid characters: {ticker}");
        }
        Ok(ticker)
    }

    fn listing_query(&self, cursor: Option<String>) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("limit", self.page_size.to_string()),
            ("status", self.market_status.clone()),
        ];
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor));
        }
        query
    }
}

#[async_trait]
impl MarketVenue for KalshiClient {
    async fn list_markets(&self, cursor: Option<String>) -> Option<MarketPage> {
        let url = format!("{}/markets", self.base_url);
        let query = self.listing_query(cursor);

        let raw: RawMarketsResponse = self.fetcher.get_json(&url, &query).await?;
        Some(MarketPage::from(raw))
    }

    async fn get_market(&self, ticker: &str) -> Option<MarketSnapshot> {
        let ticker = match Self::validate_ticker(ticker) {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(ticker, error = %e, "Refusing to query market");
                return None;
            }
        };
        let url = format!("{}/markets/{}", self.base_url, urlencoding::encode(ticker));

        let raw: RawMarketResponse = self.fetcher.get_json(&url, &[]).await?;
        raw.market.map(MarketSnapshot::from)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

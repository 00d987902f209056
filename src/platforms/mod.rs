//! Venue integrations.
//!
//! Defines the `MarketVenue` trait the engine talks to, the resilient
//! HTTP fetcher that is the only point of contact with the network, and
//! the Kalshi REST client built on top of it.

pub mod fetcher;
pub mod kalshi;

use async_trait::async_trait;

use crate::types::MarketSnapshot;

/// One page of a cursor-paginated market listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarketPage {
    pub markets: Vec<MarketSnapshot>,
    /// Continuation token; `None` on the last page.
    pub cursor: Option<String>,
}

/// Read-only view of a prediction-market venue.
///
/// Both calls return `None` for any upstream failure. Callers treat that
/// as "try later", never as fatal.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketVenue: Send + Sync {
    /// Fetch one listing page, starting after `cursor` (first page on `None`).
    async fn list_markets(&self, cursor: Option<String>) -> Option<MarketPage>;

    /// Fetch a single market by ticker.
    async fn get_market(&self, ticker: &str) -> Option<MarketSnapshot>;
}

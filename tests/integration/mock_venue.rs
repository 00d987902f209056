//! In-memory venue for integration testing.
//!
//! Serves a mutable set of markets through the same paginated listing and
//! single-market lookups as the real client. Clones share state, so a test
//! can hand one clone to the orchestrator and keep steering the other.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chalk::platforms::{MarketPage, MarketVenue};
use chalk::types::{MarketResult, MarketSnapshot, MarketStatus};

#[derive(Default)]
struct VenueState {
    markets: BTreeMap<String, MarketSnapshot>,
    listing_down: bool,
    lookups_down: bool,
    list_calls: usize,
    get_calls: usize,
}

#[derive(Clone)]
pub struct ScriptedVenue {
    page_size: usize,
    state: Arc<Mutex<VenueState>>,
}

impl ScriptedVenue {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            state: Arc::new(Mutex::new(VenueState::default())),
        }
    }

    /// An open market closing `close_in_hours` from now.
    pub fn market(id: &str, bid: u32, ask: u32, close_in_hours: i64) -> MarketSnapshot {
        MarketSnapshot {
            id: id.to_string(),
            title: format!("Will {id} happen?"),
            yes_bid: Some(bid),
            yes_ask: Some(ask),
            status: MarketStatus::Active,
            close_time: Some(Utc::now() + Duration::hours(close_in_hours)),
            result: None,
            category: None,
            volume: Some(500),
            open_interest: Some(250),
        }
    }

    pub fn list(&self, snapshot: MarketSnapshot) {
        let mut state = self.state.lock().unwrap();
        state.markets.insert(snapshot.id.clone(), snapshot);
    }

    pub fn quote(&self, id: &str, bid: u32, ask: u32) {
        if let Some(m) = self.state.lock().unwrap().markets.get_mut(id) {
            m.yes_bid = Some(bid);
            m.yes_ask = Some(ask);
        }
    }

    pub fn settle(&self, id: &str, result: &str) {
        if let Some(m) = self.state.lock().unwrap().markets.get_mut(id) {
            m.status = MarketStatus::Settled;
            m.result = MarketResult::parse(result);
        }
    }

    pub fn set_listing_down(&self, down: bool) {
        self.state.lock().unwrap().listing_down = down;
    }

    pub fn set_lookups_down(&self, down: bool) {
        self.state.lock().unwrap().lookups_down = down;
    }

    pub fn list_calls(&self) -> usize {
        self.state.lock().unwrap().list_calls
    }

    pub fn get_calls(&self) -> usize {
        self.state.lock().unwrap().get_calls
    }
}

#[async_trait]
impl MarketVenue for ScriptedVenue {
    async fn list_markets(&self, cursor: Option<String>) -> Option<MarketPage> {
        let mut state = self.state.lock().unwrap();
        state.list_calls += 1;
        if state.listing_down {
            return None;
        }

        // Only open markets are listed, like the real status filter.
        let open: Vec<&MarketSnapshot> = state
            .markets
            .values()
            .filter(|m| !m.is_settled())
            .collect();

        let start: usize = cursor.as_deref().and_then(|c| c.parse().ok()).unwrap_or(0);
        let end = (start + self.page_size).min(open.len());
        let markets = open.get(start..end).unwrap_or_default().iter().map(|m| (*m).clone()).collect();
        let cursor = (end < open.len()).then(|| end.to_string());

        Some(MarketPage { markets, cursor })
    }

    async fn get_market(&self, ticker: &str) -> Option<MarketSnapshot> {
        let mut state = self.state.lock().unwrap();
        state.get_calls += 1;
        if state.lookups_down {
            return None;
        }
        state.markets.get(ticker).cloned()
    }
}

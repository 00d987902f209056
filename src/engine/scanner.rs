//! Paginated market scanner.
//!
//! Walks the venue's cursor-paginated listing and accumulates every page
//! into one candidate list. A failed page is retried after a pause; too
//! many consecutive failures cut the scan short, and whatever was
//! collected so far is returned. Availability over completeness.

use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::RetryConfig;
use crate::platforms::MarketVenue;
use crate::types::MarketSnapshot;

/// Pacing and failure ceiling for a listing scan.
#[derive(Debug, Clone)]
pub struct PagerConfig {
    /// Consecutive failed pages tolerated; one more aborts the scan.
    pub max_failures: u32,
    pub failure_delay: Duration,
    pub page_delay: Duration,
}

impl Default for PagerConfig {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for PagerConfig {
    fn from(cfg: &RetryConfig) -> Self {
        Self {
            max_failures: cfg.max_page_failures,
            failure_delay: cfg.page_failure_delay(),
            page_delay: cfg.page_delay(),
        }
    }
}

pub struct MarketPager {
    config: PagerConfig,
}

impl MarketPager {
    pub fn new(config: PagerConfig) -> Self {
        Self { config }
    }

    /// Fetch every page of open markets. Never fails; a partial list is
    /// returned if the venue stays unavailable.
    pub async fn fetch_all_open_markets(&self, venue: &dyn MarketVenue) -> Vec<MarketSnapshot> {
        info!("Scanning venue for open markets...");

        let mut all_markets = Vec::new();
        let mut cursor: Option<String> = None;
        let mut failures = 0u32;
        let mut pages = 0u32;

        loop {
            let page = match venue.list_markets(cursor.clone()).await {
                Some(page) => page,
                None => {
                    failures += 1;
                    if failures > self.config.max_failures {
                        warn!(
                            failures,
                            collected = all_markets.len(),
                            "Listing unavailable, ending scan early"
                        );
                        break;
                    }
                    warn!(failures, cursor = ?cursor, "Page fetch failed, retrying");
                    tokio::time::sleep(self.config.failure_delay).await;
                    continue;
                }
            };

            failures = 0;
            pages += 1;
            let batch = page.markets.len();
            all_markets.extend(page.markets);

            debug!(page = pages, results = batch, total = all_markets.len(), "Page fetched");

            let Some(next) = page.cursor else {
                break;
            };
            if batch == 0 {
                break;
            }

            cursor = Some(next);
            tokio::time::sleep(self.config.page_delay).await;
        }

        info!(pages, total = all_markets.len(), "Scan complete");
        all_markets
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platforms::{MarketPage, MockMarketVenue};
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    fn pager() -> MarketPager {
        MarketPager::new(PagerConfig {
            max_failures: 3,
            failure_delay: Duration::ZERO,
            page_delay: Duration::ZERO,
        })
    }

    fn page(ids: &[&str], cursor: Option<&str>) -> Option<MarketPage> {
        Some(MarketPage {
            markets: ids.iter().map(|id| MarketSnapshot::sample(id, 50, 52)).collect(),
            cursor: cursor.map(String::from),
        })
    }

    /// A mock venue that replays `script` and records the cursors it was asked for.
    fn scripted(
        script: Vec<Option<MarketPage>>,
        expected_calls: usize,
    ) -> (MockMarketVenue, Arc<Mutex<Vec<Option<String>>>>) {
        let mut script = VecDeque::from(script);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);

        let mut venue = MockMarketVenue::new();
        venue
            .expect_list_markets()
            .times(expected_calls)
            .returning(move |cursor| {
                log.lock().unwrap().push(cursor);
                script.pop_front().flatten()
            });
        (venue, seen)
    }

    fn ids(markets: &[MarketSnapshot]) -> Vec<&str> {
        markets.iter().map(|m| m.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_stops_on_missing_cursor() {
        let (venue, seen) = scripted(
            vec![
                page(&["A", "B"], Some("c1")),
                page(&["C"], Some("c2")),
                page(&["D", "E"], None),
                page(&["NEVER"], None),
            ],
            3,
        );

        let markets = pager().fetch_all_open_markets(&venue).await;
        assert_eq!(ids(&markets), vec!["A", "B", "C", "D", "E"]);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![None, Some("c1".to_string()), Some("c2".to_string())]
        );
    }

    #[tokio::test]
    async fn test_stops_on_empty_page() {
        let (venue, _) = scripted(
            vec![page(&["A"], Some("c1")), page(&[], Some("c2"))],
            2,
        );
        let markets = pager().fetch_all_open_markets(&venue).await;
        assert_eq!(ids(&markets), vec!["A"]);
    }

    #[tokio::test]
    async fn test_aborts_after_four_consecutive_failures() {
        let (venue, seen) = scripted(
            vec![page(&["A", "B"], Some("c1")), None, None, None, None],
            5,
        );

        let markets = pager().fetch_all_open_markets(&venue).await;
        assert_eq!(ids(&markets), vec!["A", "B"]);
        // Every retry asks for the same page again.
        let seen = seen.lock().unwrap();
        assert!(seen[1..].iter().all(|c| c.as_deref() == Some("c1")));
    }

    #[tokio::test]
    async fn test_failure_counter_resets_on_success() {
        let (venue, _) = scripted(
            vec![
                None,
                None,
                None,
                page(&["A"], Some("c1")),
                None,
                None,
                None,
                page(&["B"], None),
            ],
            8,
        );

        let markets = pager().fetch_all_open_markets(&venue).await;
        assert_eq!(ids(&markets), vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_unavailable_from_start_returns_empty() {
        let (venue, _) = scripted(vec![None, None, None, None], 4);
        let markets = pager().fetch_all_open_markets(&venue).await;
        assert!(markets.is_empty());
    }

    #[test]
    fn test_config_from_retry() {
        let cfg = PagerConfig::default();
        assert_eq!(cfg.max_failures, 3);
        assert_eq!(cfg.failure_delay, Duration::from_secs(2));
        assert_eq!(cfg.page_delay, Duration::from_millis(200));
    }
}

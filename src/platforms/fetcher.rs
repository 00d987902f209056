//! Resilient HTTP GET.
//!
//! Every request runs under a client-wide timeout. A 429 is a throttle
//! signal, not an error: the same request is retried in a bounded loop
//! with exponential backoff. Everything else that goes wrong (non-2xx,
//! transport failure, undecodable body) is logged and surfaces as `None`.

use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::{RetryConfig, VenueConfig};

/// Retry behaviour for rate-limited requests.
#[derive(Debug, Clone)]
pub struct RateLimitPolicy {
    /// Retries after the first 429; total attempts are `max_retries + 1`.
    pub max_retries: u32,
    pub base_backoff: Duration,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_backoff: Duration::from_secs(1),
        }
    }
}

impl From<&RetryConfig> for RateLimitPolicy {
    fn from(cfg: &RetryConfig) -> Self {
        Self {
            max_retries: cfg.max_rate_limit_retries,
            base_backoff: cfg.rate_limit_backoff(),
        }
    }
}

impl RateLimitPolicy {
    /// Delay before retry number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_backoff.saturating_mul(factor)
    }
}

/// GET-only JSON fetcher with timeout and 429 handling.
pub struct HttpFetcher {
    http: Client,
    policy: RateLimitPolicy,
}

impl HttpFetcher {
    pub fn new(venue: &VenueConfig, policy: RateLimitPolicy) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(venue.timeout_secs))
            .user_agent(venue.user_agent.as_str())
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { http, policy })
    }

    /// GET `url` with `query` and decode the JSON body.
    ///
    /// Returns `None` on any failure; never propagates an error.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Option<T> {
        let mut attempt = 0u32;

        loop {
            debug!(url, attempt, "GET");

            let resp = match self.http.get(url).query(query).send().await {
                Ok(resp) => resp,
                Err(e) => {
                    warn!(url, error = %e, "Request failed");
                    return None;
                }
            };

            let status = resp.status();

            if status == StatusCode::TOO_MANY_REQUESTS {
                if attempt >= self.policy.max_retries {
                    warn!(url, attempts = attempt + 1, "Still rate limited, giving up");
                    return None;
                }
                attempt += 1;
                let delay = self.policy.backoff(attempt);
                warn!(url, attempt, delay_ms = delay.as_millis() as u64, "Rate limited, backing off");
                tokio::time::sleep(delay).await;
                continue;
            }

            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                warn!(url, status = %status, body = %body, "Upstream error");
                return None;
            }

            return match resp.json::<T>().await {
                Ok(body) => Some(body),
                Err(e) => {
                    warn!(url, error = %e, "Malformed response body");
                    None
                }
            };
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Single upstream GET with exponential backoff on HTTP 429

use super::RequestQuota;
use crate::error::{Error, Result};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// How many times and how long to wait on rate limiting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    /// Wait before retry number `attempt` (0-based): `base * 2^attempt`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }

    /// Total wait if every retry is used
    pub fn total_delay(&self) -> Duration {
        (0..self.max_retries).map(|a| self.delay_for(a)).sum()
    }
}

/// Upstream URL with credentials stripped, for logs and errors
fn display_url(url: &Url) -> String {
    let mut shown = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != "key")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    shown.query_pairs_mut().clear().extend_pairs(pairs);
    shown.to_string()
}

pub struct BackoffFetcher {
    client: Client,
    policy: RetryPolicy,
    quota: Option<Arc<RequestQuota>>,
}

impl BackoffFetcher {
    pub fn new(client: Client, policy: RetryPolicy, quota: Option<Arc<RequestQuota>>) -> Self {
        Self {
            client,
            policy,
            quota,
        }
    }

    /// GET `url` and decode the JSON body.
    ///
    /// Only 429 is retried. Any other failure status or transport error is
    /// returned on the first occurrence.
    pub async fn fetch_json<T: DeserializeOwned>(&self, url: &Url) -> Result<T> {
        let mut attempt: u32 = 0;

        loop {
            if let Some(quota) = &self.quota {
                quota.wait().await;
            }

            debug!("Fetching: {}", display_url(url));
            let response = self.client.get(url.clone()).send().await?;
            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS {
                if attempt < self.policy.max_retries {
                    let wait = self.policy.delay_for(attempt);
                    warn!(
                        "Rate limit hit. Retrying after {}ms (retry {}/{})",
                        wait.as_millis(),
                        attempt + 1,
                        self.policy.max_retries
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                    continue;
                }
                return Err(Error::RateLimited {
                    url: display_url(url),
                    retries: attempt,
                });
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let snippet: String = body.chars().take(200).collect();
                return Err(Error::Upstream(format!(
                    "HTTP {} from {}: {}",
                    status,
                    display_url(url),
                    snippet
                )));
            }

            return Ok(response.json::<T>().await?);
        }
    }
}

//! Sliding-Window Rate Limiter
//!
//! Bounds outbound requests to N per rolling window of W. Timestamps of the
//! requests inside the current window are kept in order; when the window is
//! full the caller sleeps until the oldest one leaves it.
//!
//! One instance is shared (`Arc`) by every caller of the same provider so the
//! global rate stays bounded.

use std::collections::VecDeque;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::ports::ProviderError;

/// BirdEye free tier allowance
pub const DEFAULT_MAX_REQUESTS: usize = 35;
pub const DEFAULT_WINDOW_SECS: u64 = 60;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// Backoff after a 429, indexed by retry number
pub const DEFAULT_RETRY_DELAYS_SECS: [u64; 3] = [1, 5, 15];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimiterConfig {
    /// Maximum requests per window
    pub max_requests: usize,
    /// Window length in seconds
    pub window_secs: u64,
    /// Retries after a rate-limit response (total attempts = retries + 1)
    pub max_retries: u32,
    /// Backoff schedule in seconds; the last entry repeats if retries outnumber it
    pub retry_delays_secs: Vec<u64>,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            max_requests: DEFAULT_MAX_REQUESTS,
            window_secs: DEFAULT_WINDOW_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delays_secs: DEFAULT_RETRY_DELAYS_SECS.to_vec(),
        }
    }
}

impl RateLimiterConfig {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window_secs: window.as_secs(),
            ..Default::default()
        }
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimiterConfig,
    /// Request timestamps inside the current window, oldest first
    requests: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            requests: Mutex::new(VecDeque::with_capacity(config.max_requests)),
            config,
        }
    }

    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }

    /// Wait until one more request fits in the window, then record it
    pub async fn acquire(&self) {
        let window = self.config.window();
        let mut requests = self.requests.lock().await;

        let now = Instant::now();
        prune(&mut requests, now, window);

        if requests.len() >= self.config.max_requests {
            if let Some(&oldest) = requests.front() {
                let wait = (oldest + window).saturating_duration_since(now);
                tracing::info!(
                    wait_ms = wait.as_millis() as u64,
                    in_window = requests.len(),
                    "Rate limit window full, waiting"
                );
                tokio::time::sleep(wait).await;
                prune(&mut requests, Instant::now(), window);
            }
        }

        requests.push_back(Instant::now());
    }

    /// Number of requests currently counted against the window
    pub async fn in_window(&self) -> usize {
        let mut requests = self.requests.lock().await;
        prune(&mut requests, Instant::now(), self.config.window());
        requests.len()
    }

    /// Run `request` under the limiter, retrying rate-limit responses on the
    /// backoff schedule.
    ///
    /// - `RateLimited`: retried up to `max_retries` times, then
    ///   `RetriesExhausted`
    /// - `Unauthorized`: returned at once (not transient)
    /// - anything else: returned at once, the caller decides
    pub async fn request_with_retry<T, F, Fut>(&self, mut request: F) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut retries: u32 = 0;

        loop {
            self.acquire().await;

            match request().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && retries < self.config.max_retries => {
                    let backoff = self.retry_delay(retries);
                    tracing::warn!(
                        "Rate limited, retrying in {:?} (attempt {}/{})",
                        backoff,
                        retries + 1,
                        self.config.max_retries
                    );
                    tokio::time::sleep(backoff).await;
                    retries += 1;
                }
                Err(e) if e.is_transient() => {
                    tracing::error!(attempts = retries + 1, "Max retries exceeded");
                    return Err(ProviderError::RetriesExhausted { attempts: retries + 1 });
                }
                Err(ProviderError::Unauthorized) => {
                    tracing::error!("API key invalid or missing");
                    return Err(ProviderError::Unauthorized);
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn retry_delay(&self, retry: u32) -> Duration {
        let delays = &self.config.retry_delays_secs;
        let secs = delays
            .get(retry as usize)
            .or_else(|| delays.last())
            .copied()
            .unwrap_or(1);
        Duration::from_secs(secs)
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimiterConfig::default())
    }
}

/// Drop timestamps that have left the window
fn prune(requests: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(&oldest) = requests.front() {
        if now.duration_since(oldest) >= window {
            requests.pop_front();
        } else {
            break;
        }
    }
}

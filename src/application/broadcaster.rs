//! Webhook Broadcaster
//!
//! Owns the subscriber set and pushes each refreshed snapshot to every
//! subscriber concurrently. A subscriber gets up to `max_attempts` tries with
//! exponential backoff; a slow or failing subscriber never holds up the others.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::domain::{now_unix, DatasetSnapshot, TokenRecord};
use crate::ports::{DeliveryError, WebhookTransport};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum WebhookError {
    #[error("Webhook already registered: {0}")]
    AlreadyRegistered(String),

    #[error("Webhook not registered: {0}")]
    NotRegistered(String),

    #[error("Invalid webhook URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// Per-subscriber retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay after the first failed attempt; doubles each time
    pub backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Delay after failed attempt `attempt` (1-based): 2s, 4s, 8s, ...
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_base
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

/// Body POSTed to every subscriber
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookPayload {
    /// RFC 3339 send time
    pub timestamp: String,
    /// Refresh interval in seconds
    pub update_interval: u64,
    pub total_tokens: usize,
    pub total_market_cap: f64,
    pub total_volume_24h: f64,
    pub tokens: Vec<TokenRecord>,
}

impl WebhookPayload {
    pub fn new(snapshot: &DatasetSnapshot, update_interval: u64) -> Self {
        let totals = snapshot.totals();
        Self {
            timestamp: Utc::now().to_rfc3339(),
            update_interval,
            total_tokens: snapshot.len(),
            total_market_cap: totals.total_market_cap,
            total_volume_24h: totals.total_volume_24h,
            tokens: snapshot.tokens.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastResult {
    pub sent: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastBroadcast {
    /// Unix seconds
    pub at: i64,
    pub result: BroadcastResult,
}

impl LastBroadcast {
    pub fn at_datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp(self.at, 0)
    }
}

pub struct WebhookBroadcaster {
    transport: Arc<dyn WebhookTransport>,
    policy: RetryPolicy,
    update_interval_secs: u64,
    subscribers: RwLock<Vec<String>>,
    last_broadcast: RwLock<Option<LastBroadcast>>,
}

/// Only absolute http(s) URLs are accepted
pub fn validate_url(url: &str) -> Result<(), WebhookError> {
    let invalid = |reason: String| WebhookError::InvalidUrl {
        url: url.to_string(),
        reason,
    };

    let parsed = Url::parse(url).map_err(|e| invalid(e.to_string()))?;
    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some() => Ok(()),
        "http" | "https" => Err(invalid("missing host".to_string())),
        other => Err(invalid(format!("unsupported scheme '{}'", other))),
    }
}

impl WebhookBroadcaster {
    pub fn new(transport: Arc<dyn WebhookTransport>, policy: RetryPolicy, update_interval_secs: u64) -> Self {
        Self {
            transport,
            policy,
            update_interval_secs,
            subscribers: RwLock::new(Vec::new()),
            last_broadcast: RwLock::new(None),
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub async fn register(&self, url: &str) -> Result<(), WebhookError> {
        validate_url(url)?;

        let mut subscribers = self.subscribers.write().await;
        if subscribers.iter().any(|s| s == url) {
            tracing::warn!(url = %url, "Webhook already registered");
            return Err(WebhookError::AlreadyRegistered(url.to_string()));
        }

        subscribers.push(url.to_string());
        tracing::info!(url = %url, "Registered new webhook");
        Ok(())
    }

    pub async fn unregister(&self, url: &str) -> Result<(), WebhookError> {
        let mut subscribers = self.subscribers.write().await;
        let Some(pos) = subscribers.iter().position(|s| s == url) else {
            return Err(WebhookError::NotRegistered(url.to_string()));
        };

        subscribers.remove(pos);
        tracing::info!(url = %url, "Unregistered webhook");
        Ok(())
    }

    /// Registered URLs in registration order
    pub async fn list(&self) -> Vec<String> {
        self.subscribers.read().await.clone()
    }

    pub async fn last_broadcast(&self) -> Option<LastBroadcast> {
        *self.last_broadcast.read().await
    }

    /// Deliver `snapshot` to every subscriber. Never fails as a whole: each
    /// subscriber counts as either sent or failed.
    pub async fn broadcast(&self, snapshot: &DatasetSnapshot) -> BroadcastResult {
        let subscribers = self.list().await;
        if subscribers.is_empty() {
            tracing::info!("No webhooks registered, skipping broadcast");
            return BroadcastResult::default();
        }

        let payload = WebhookPayload::new(snapshot, self.update_interval_secs);
        let body = match serde_json::to_vec(&payload) {
            Ok(body) => body,
            Err(e) => {
                tracing::error!("Failed to encode webhook payload: {}", e);
                return BroadcastResult {
                    sent: 0,
                    failed: subscribers.len(),
                };
            }
        };

        let outcomes = join_all(subscribers.iter().map(|url| self.deliver(url, &body))).await;
        let sent = outcomes.iter().filter(|ok| **ok).count();
        let result = BroadcastResult {
            sent,
            failed: outcomes.len() - sent,
        };

        tracing::info!(sent = result.sent, failed = result.failed, "Webhook broadcast completed");
        *self.last_broadcast.write().await = Some(LastBroadcast {
            at: now_unix(),
            result,
        });

        result
    }

    /// One subscriber, with retries. True on a 200/201/202 response.
    async fn deliver(&self, url: &str, body: &[u8]) -> bool {
        let max_attempts = self.policy.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            let error = match self.transport.post_json(url, body).await {
                Ok(200 | 201 | 202) => {
                    tracing::debug!(url = %url, attempt, "Webhook delivered");
                    return true;
                }
                Ok(status) => DeliveryError::Status(status),
                Err(e) => e,
            };

            if attempt < max_attempts {
                let delay = self.policy.backoff(attempt);
                tracing::warn!(url = %url, attempt, error = %error, "Webhook delivery failed, retrying in {:?}", delay);
                tokio::time::sleep(delay).await;
            } else {
                tracing::error!(url = %url, attempts = max_attempts, error = %error, "Webhook delivery failed after retries");
            }
        }

        false
    }
}

//! Webhook Transport Port

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DeliveryError {
    #[error("Request timed out")]
    Timeout,

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Subscriber returned status {0}")]
    Status(u16),
}

/// Posts a JSON body to a subscriber URL
#[async_trait]
pub trait WebhookTransport: Send + Sync {
    /// Send `body` and return the response status code. Transport-level
    /// failures (timeout, refused connection) are errors.
    async fn post_json(&self, url: &str, body: &[u8]) -> Result<u16, DeliveryError>;
}

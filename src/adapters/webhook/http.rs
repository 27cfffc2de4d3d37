//! HTTP Webhook Transport

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::ports::{DeliveryError, WebhookTransport};

#[derive(Debug, Clone)]
pub struct HttpWebhookTransport {
    http: Client,
}

impl HttpWebhookTransport {
    pub fn new(timeout: Duration) -> Result<Self, DeliveryError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DeliveryError::Connection(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { http })
    }
}

#[async_trait]
impl WebhookTransport for HttpWebhookTransport {
    async fn post_json(&self, url: &str, body: &[u8]) -> Result<u16, DeliveryError> {
        let response = self
            .http
            .post(url)
            .header("Content-Type", "application/json")
            .body(body.to_vec())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DeliveryError::Timeout
                } else {
                    DeliveryError::Connection(e.to_string())
                }
            })?;

        Ok(response.status().as_u16())
    }
}

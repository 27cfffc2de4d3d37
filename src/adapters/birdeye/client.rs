//! BirdEye Client
//!
//! Token list search (sorted by liquidity) and holder listings from the BirdEye
//! public API. Every request is funnelled through the shared `RateLimiter`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::types::{BirdeyeResponse, HolderItem, ItemsData, TokenListItem};
use crate::adapters::rate_limit::RateLimiter;
use crate::domain::HolderBalance;
use crate::ports::{ListedToken, ProviderError, TokenProvider};

/// Environment variable holding the API key
pub const API_KEY_ENV: &str = "BIRDEYE_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BirdeyeConfig {
    /// API base URL
    pub api_url: String,
    /// API key (`X-API-KEY`); lookups are disabled without it
    pub api_key: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for BirdeyeConfig {
    fn default() -> Self {
        Self {
            api_url: "https://public-api.birdeye.so/defi".to_string(),
            api_key: None,
            timeout_secs: 30,
        }
    }
}

impl BirdeyeConfig {
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct BirdeyeClient {
    config: BirdeyeConfig,
    http: Client,
    limiter: Arc<RateLimiter>,
}

impl BirdeyeClient {
    pub fn new(config: BirdeyeConfig, limiter: Arc<RateLimiter>) -> Result<Self, ProviderError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ProviderError::Http(format!("Failed to create HTTP client: {}", e)))?;

        let config = BirdeyeConfig {
            api_key: config.api_key.map(|k| k.trim().to_string()).filter(|k| !k.is_empty()),
            ..config
        };

        match &config.api_key {
            Some(key) => tracing::info!("BirdEye API key loaded: {}...", key.chars().take(8).collect::<String>()),
            None => tracing::warn!("{} not set, mint lookups limited to known tokens", API_KEY_ENV),
        }

        Ok(Self { config, http, limiter })
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    fn api_key(&self) -> Result<&str, ProviderError> {
        self.config
            .api_key
            .as_deref()
            .ok_or(ProviderError::MissingCredentials)
    }

    /// One GET against the API, mapped onto `ProviderError`
    async fn get_items<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, ProviderError> {
        let api_key = self.api_key()?;
        let url = format!("{}{}", self.config.api_url, path);

        let response = self
            .http
            .get(&url)
            .header("accept", "application/json")
            .header("x-chain", "solana")
            .header("X-API-KEY", api_key)
            .query(query)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Http(format!("Request timeout for {}", url))
                } else {
                    ProviderError::Http(e.to_string())
                }
            })?;

        status_to_result(response.status())?;

        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?;
        parse_items(&body)
    }
}

/// Map a response status onto the error taxonomy
pub(crate) fn status_to_result(status: StatusCode) -> Result<(), ProviderError> {
    match status {
        s if s.is_success() => Ok(()),
        StatusCode::TOO_MANY_REQUESTS => Err(ProviderError::RateLimited),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ProviderError::Unauthorized),
        s => Err(ProviderError::Status(s.as_u16())),
    }
}

/// Decode an `{ success, data: { items } }` body
pub(crate) fn parse_items<T: DeserializeOwned>(body: &str) -> Result<Vec<T>, ProviderError> {
    let response: BirdeyeResponse<ItemsData<T>> =
        serde_json::from_str(body).map_err(|e| ProviderError::Parse(e.to_string()))?;

    if !response.success {
        return Err(ProviderError::Parse(
            response
                .message
                .unwrap_or_else(|| "unsuccessful response".to_string()),
        ));
    }

    response
        .data
        .map(|d| d.items)
        .ok_or_else(|| ProviderError::Parse("missing data.items".to_string()))
}

#[async_trait]
impl TokenProvider for BirdeyeClient {
    fn has_credentials(&self) -> bool {
        self.config.api_key.is_some()
    }

    async fn search_tokens(
        &self,
        keyword: Option<&str>,
        limit: usize,
    ) -> Result<Vec<ListedToken>, ProviderError> {
        self.api_key()?;

        let mut query = vec![
            ("sort_by", "liquidity".to_string()),
            ("sort_type", "desc".to_string()),
            ("offset", "0".to_string()),
            ("limit", limit.to_string()),
        ];
        if let Some(keyword) = keyword {
            query.push(("search", keyword.to_string()));
        }

        let items: Vec<TokenListItem> = self
            .limiter
            .request_with_retry(|| self.get_items("/v3/token/list", &query))
            .await?;

        Ok(items.into_iter().filter_map(TokenListItem::into_listed).collect())
    }

    async fn token_holders(
        &self,
        mint: &str,
        limit: usize,
    ) -> Result<Vec<HolderBalance>, ProviderError> {
        self.api_key()?;

        let query = vec![
            ("address", mint.to_string()),
            ("offset", "0".to_string()),
            ("limit", limit.to_string()),
            ("ui_amount_mode", "scaled".to_string()),
        ];

        let items: Vec<HolderItem> = self
            .limiter
            .request_with_retry(|| self.get_items("/v3/token/holder", &query))
            .await?;

        Ok(items.into_iter().filter_map(HolderItem::into_balance).collect())
    }
}

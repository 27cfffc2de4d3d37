//! CoinGecko Markets Client
//!
//! Fetches the Solana ecosystem category from `/coins/markets`, ordered by
//! market cap. Failures never propagate: they are logged and turned into an
//! empty listing so callers treat "no data" the same way whatever the cause.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ports::{MarketDataSource, MarketEntry};

/// CoinGecko allows at most 250 results per page
pub const MAX_PER_PAGE: usize = 250;

#[derive(Debug, Error)]
pub enum MarketDataError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("CoinGecko returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to parse response: {0}")]
    ParseError(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoinGeckoConfig {
    /// API base URL
    pub api_url: String,
    /// Quote currency
    pub vs_currency: String,
    /// Category filter
    pub category: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for CoinGeckoConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.coingecko.com/api/v3".to_string(),
            vs_currency: "usd".to_string(),
            category: "solana-ecosystem".to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CoinGeckoClient {
    config: CoinGeckoConfig,
    http: Client,
}

impl CoinGeckoClient {
    pub fn new() -> Result<Self, MarketDataError> {
        Self::with_config(CoinGeckoConfig::default())
    }

    pub fn with_config(config: CoinGeckoConfig) -> Result<Self, MarketDataError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, http })
    }

    pub fn config(&self) -> &CoinGeckoConfig {
        &self.config
    }

    /// Fetch one page of market listings
    pub async fn get_markets(&self, count: usize) -> Result<Vec<MarketEntry>, MarketDataError> {
        let per_page = count.clamp(1, MAX_PER_PAGE).to_string();
        let url = format!("{}/coins/markets", self.config.api_url);

        tracing::info!(per_page = %per_page, category = %self.config.category, "Fetching tokens from CoinGecko");

        let response = self
            .http
            .get(&url)
            .query(&[
                ("vs_currency", self.config.vs_currency.as_str()),
                ("category", self.config.category.as_str()),
                ("order", "market_cap_desc"),
                ("per_page", per_page.as_str()),
                ("page", "1"),
                ("sparkline", "false"),
                ("price_change_percentage", "24h"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MarketDataError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        parse_markets(&body, count)
    }
}

/// Decode a `/coins/markets` body, keeping provider order and at most `count` rows.
/// A row that does not decode is skipped; a body that is not an array is an error.
pub fn parse_markets(body: &str, count: usize) -> Result<Vec<MarketEntry>, MarketDataError> {
    let rows: Vec<serde_json::Value> =
        serde_json::from_str(body).map_err(|e| MarketDataError::ParseError(e.to_string()))?;

    let entries = rows
        .into_iter()
        .enumerate()
        .filter_map(|(idx, row)| match serde_json::from_value::<MarketEntry>(row) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(row = idx, "Skipping malformed market row: {}", e);
                None
            }
        })
        .take(count)
        .collect();

    Ok(entries)
}

#[async_trait]
impl MarketDataSource for CoinGeckoClient {
    async fn fetch_top_tokens(&self, count: usize) -> Vec<MarketEntry> {
        if count == 0 {
            return Vec::new();
        }

        match self.get_markets(count).await {
            Ok(entries) => {
                tracing::info!("Fetched {} tokens from CoinGecko", entries.len());
                entries
            }
            Err(e) => {
                tracing::error!("CoinGecko fetch failed: {}", e);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MARKETS_BODY: &str = r#"[
        {
            "id": "solana",
            "symbol": "sol",
            "name": "Solana",
            "image": "https://assets.coingecko.com/coins/images/4128/large/solana.png",
            "current_price": 145.2,
            "market_cap": 68000000000,
            "market_cap_rank": 5,
            "total_volume": 2100000000,
            "price_change_percentage_24h": -1.25
        },
        {
            "id": "bonk",
            "symbol": "bonk",
            "name": "Bonk",
            "current_price": 0.000021,
            "market_cap": 1500000000,
            "total_volume": 120000000,
            "price_change_percentage_24h": null
        },
        {
            "id": "new-token",
            "symbol": "new",
            "name": "New Token",
            "current_price": null,
            "market_cap": null,
            "total_volume": null
        }
    ]"#;

    #[test]
    fn test_config_default() {
        let config = CoinGeckoConfig::default();
        assert_eq!(config.api_url, "https://api.coingecko.com/api/v3");
        assert_eq!(config.category, "solana-ecosystem");
        assert_eq!(config.vs_currency, "usd");
    }

    #[test]
    fn test_client_creation() {
        assert!(CoinGeckoClient::new().is_ok());
    }

    #[test]
    fn test_parse_markets() {
        let entries = parse_markets(MARKETS_BODY, 10).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].id, "solana");
        assert_eq!(entries[0].symbol, "sol");
        assert_eq!(entries[0].market_cap, Some(68_000_000_000.0));
        assert_eq!(entries[1].price_change_percentage_24h, None);
        assert_eq!(entries[2].market_cap, None);
        assert_eq!(entries[2].current_price, None);
    }

    #[test]
    fn test_parse_markets_truncates() {
        let entries = parse_markets(MARKETS_BODY, 2).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].id, "bonk");
    }

    #[test]
    fn test_parse_markets_skips_bad_rows() {
        let body = r#"[
            {"id": "solana", "symbol": "sol", "name": "Solana", "market_cap": 68000000000},
            {"id": "broken", "symbol": null, "name": "Broken"},
            {"id": "bonk", "symbol": "bonk", "name": "Bonk", "market_cap": 1500000000}
        ]"#;

        let entries = parse_markets(body, 10).unwrap();
        let ids: Vec<&str> = entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["solana", "bonk"]);
    }

    #[test]
    fn test_parse_markets_malformed() {
        let result = parse_markets(r#"{"status": {"error_code": 429}}"#, 10);
        assert!(matches!(result, Err(MarketDataError::ParseError(_))));
    }

    #[tokio::test]
    async fn test_unreachable_host_yields_empty() {
        let client = CoinGeckoClient::with_config(CoinGeckoConfig {
            api_url: "http://127.0.0.1:1".to_string(),
            timeout_secs: 2,
            ..Default::default()
        })
        .unwrap();

        assert!(client.fetch_top_tokens(10).await.is_empty());
    }
}

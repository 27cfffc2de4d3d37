//! Market Data Port
//!
//! Ranked token listings from the market-data provider.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One ranked listing entry as delivered by the provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketEntry {
    pub id: String,
    pub name: String,
    pub symbol: String,
    #[serde(default)]
    pub market_cap: Option<f64>,
    #[serde(default)]
    pub total_volume: Option<f64>,
    #[serde(default)]
    pub current_price: Option<f64>,
    #[serde(default)]
    pub price_change_percentage_24h: Option<f64>,
}

impl MarketEntry {
    pub fn new(id: &str, name: &str, symbol: &str, market_cap: f64, total_volume: f64) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            symbol: symbol.to_string(),
            market_cap: Some(market_cap),
            total_volume: Some(total_volume),
            current_price: None,
            price_change_percentage_24h: None,
        }
    }

    pub fn with_price(mut self, price: f64, change_24h: f64) -> Self {
        self.current_price = Some(price);
        self.price_change_percentage_24h = Some(change_24h);
        self
    }
}

/// Source of ranked token listings
///
/// Implementations never fail: any network, status or decoding problem is
/// logged and reported as an empty list.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Up to `count` entries, ordered by descending market cap
    async fn fetch_top_tokens(&self, count: usize) -> Vec<MarketEntry>;
}

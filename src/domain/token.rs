//! Token Records and Dataset Snapshots
//!
//! A `TokenRecord` is one ranked asset for one refresh cycle. A `DatasetSnapshot`
//! is the complete, immutable set of records produced by a cycle. New cycles build
//! a new snapshot and swap it in whole.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

const SOLSCAN_BASE: &str = "https://solscan.io";
const BIRDEYE_BASE: &str = "https://birdeye.so";
const COINGECKO_COIN_BASE: &str = "https://www.coingecko.com/en/coins";

/// Current Unix time in seconds
pub fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

/// Links to external explorers, derived from the resolved mint address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenLinks {
    pub solscan_url: String,
    pub birdeye_url: String,
    pub coingecko_url: String,
}

impl TokenLinks {
    /// Build links for a token. Without an address, the explorer links
    /// fall back to a symbol search.
    pub fn derive(mint_address: Option<&str>, symbol: &str, coingecko_id: &str) -> Self {
        let (solscan_url, birdeye_url) = match mint_address {
            Some(mint) => (
                format!("{}/token/{}", SOLSCAN_BASE, mint),
                format!("{}/token/{}?chain=solana", BIRDEYE_BASE, mint),
            ),
            None => (
                format!("{}/token/search?keyword={}", SOLSCAN_BASE, symbol),
                format!("{}/search?q={}", BIRDEYE_BASE, symbol),
            ),
        };

        Self {
            solscan_url,
            birdeye_url,
            coingecko_url: format!("{}/{}", COINGECKO_COIN_BASE, coingecko_id),
        }
    }
}

/// One ranked token at one refresh cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenRecord {
    /// 1-based rank in provider order
    pub rank: u32,
    pub name: String,
    /// Upper-cased ticker
    pub symbol: String,
    /// Market-data provider id (e.g. "bonk")
    pub coingecko_id: String,
    /// Resolved on-chain mint, absent when the cascade found nothing
    pub mint_address: Option<String>,
    /// Market cap in USD
    pub market_cap: f64,
    /// 24h volume in USD
    pub volume_24h: f64,
    /// Current price in USD
    pub price: Option<f64>,
    /// 24h price change (percent, signed)
    pub price_change_24h: Option<f64>,
    #[serde(flatten)]
    pub links: TokenLinks,
}

impl TokenRecord {
    /// Whether a mint address was resolved for this token
    pub fn is_resolved(&self) -> bool {
        self.mint_address.is_some()
    }
}

/// Aggregate totals over a set of records
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    pub total_market_cap: f64,
    pub total_volume_24h: f64,
}

impl Totals {
    pub fn of(tokens: &[TokenRecord]) -> Self {
        tokens.iter().fold(Self::default(), |acc, t| Self {
            total_market_cap: acc.total_market_cap + t.market_cap,
            total_volume_24h: acc.total_volume_24h + t.volume_24h,
        })
    }
}

/// The full set of token records for one cycle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetSnapshot {
    /// Capture time (Unix seconds). Zero means "never captured".
    pub captured_at: i64,
    pub tokens: Vec<TokenRecord>,
}

impl DatasetSnapshot {
    pub fn new(captured_at: i64, tokens: Vec<TokenRecord>) -> Self {
        Self { captured_at, tokens }
    }

    /// Snapshot stamped with the current time
    pub fn now(tokens: Vec<TokenRecord>) -> Self {
        Self::new(now_unix(), tokens)
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn totals(&self) -> Totals {
        Totals::of(&self.tokens)
    }

    /// Number of tokens with a resolved mint address
    pub fn resolved_count(&self) -> usize {
        self.tokens.iter().filter(|t| t.is_resolved()).count()
    }

    /// Symbol -> mint mapping, as persisted alongside the snapshot
    pub fn mint_mapping(&self) -> BTreeMap<String, Option<String>> {
        self.tokens
            .iter()
            .map(|t| (t.symbol.clone(), t.mint_address.clone()))
            .collect()
    }

    /// First `limit` records, in rank order
    pub fn top(&self, limit: usize) -> Vec<TokenRecord> {
        self.tokens.iter().take(limit).cloned().collect()
    }

    /// Age in seconds relative to `now`
    pub fn age_secs(&self, now: i64) -> i64 {
        now.saturating_sub(self.captured_at)
    }
}

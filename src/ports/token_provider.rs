//! Token Provider Port
//!
//! Secondary data provider used for mint lookups (token list search) and
//! holder listings. Every call is expected to go through the shared rate limiter.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::HolderBalance;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
    #[error("No API key configured")]
    MissingCredentials,

    #[error("API key invalid or rejected")]
    Unauthorized,

    #[error("Rate limited by provider")]
    RateLimited,

    #[error("Rate limited after {attempts} attempts, giving up")]
    RetriesExhausted { attempts: u32 },

    #[error("Provider returned status {0}")]
    Status(u16),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Failed to parse response: {0}")]
    Parse(String),
}

impl ProviderError {
    /// Transient failures are worth another attempt after backoff
    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderError::RateLimited)
    }
}

/// Token list item, sorted by liquidity by the provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListedToken {
    pub address: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub liquidity: Option<f64>,
}

impl ListedToken {
    pub fn new(address: &str, symbol: &str, name: &str) -> Self {
        Self {
            address: address.to_string(),
            symbol: symbol.to_string(),
            name: name.to_string(),
            liquidity: None,
        }
    }
}

#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Whether an API credential is configured
    fn has_credentials(&self) -> bool;

    /// Token list sorted by liquidity (descending), optionally filtered by a
    /// search keyword
    async fn search_tokens(
        &self,
        keyword: Option<&str>,
        limit: usize,
    ) -> Result<Vec<ListedToken>, ProviderError>;

    /// Largest holders of a mint
    async fn token_holders(
        &self,
        mint: &str,
        limit: usize,
    ) -> Result<Vec<HolderBalance>, ProviderError>;
}

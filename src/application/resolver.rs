//! Address Resolver
//!
//! Finds the on-chain mint for a market listing by walking an ordered chain of
//! strategies and stopping at the first hit:
//!
//! 1. `KnownTable`     - static well-known mints, no network
//! 2. `SymbolSearch`   - provider search by symbol, exact match preferred
//! 3. `NameSearch`     - provider search by display name, top result
//! 4. `LiquidityScan`  - loose match over the top-liquidity page
//!
//! Network strategies never fail the chain: provider errors are logged and
//! treated as "no match from this step".

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{known_mint, DatasetSnapshot, TokenLinks, TokenRecord};
use crate::ports::{ListedToken, MarketEntry, ProviderError, TokenProvider};

/// Page sizes used by the network strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchLimits {
    pub symbol_search: usize,
    pub name_search: usize,
    pub scan: usize,
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self {
            symbol_search: 10,
            name_search: 5,
            scan: 50,
        }
    }
}

/// One step of the resolution cascade
#[async_trait]
pub trait ResolveStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// `symbol` is already upper-cased
    async fn resolve(&self, symbol: &str, name: &str) -> Option<String>;
}

/// Static table of well-known mints
#[derive(Debug, Default, Clone, Copy)]
pub struct KnownTable;

#[async_trait]
impl ResolveStrategy for KnownTable {
    fn name(&self) -> &'static str {
        "known_table"
    }

    async fn resolve(&self, symbol: &str, _name: &str) -> Option<String> {
        known_mint(symbol).map(str::to_string)
    }
}

fn log_step_failure(step: &str, keyword: &str, error: &ProviderError) {
    tracing::warn!(step, keyword = %keyword, error = %error, "Lookup step failed, continuing");
}

pub struct SymbolSearch {
    provider: Arc<dyn TokenProvider>,
    limit: usize,
}

impl SymbolSearch {
    pub fn new(provider: Arc<dyn TokenProvider>, limit: usize) -> Self {
        Self { provider, limit }
    }
}

#[async_trait]
impl ResolveStrategy for SymbolSearch {
    fn name(&self) -> &'static str {
        "symbol_search"
    }

    async fn resolve(&self, symbol: &str, _name: &str) -> Option<String> {
        let items = match self.provider.search_tokens(Some(symbol), self.limit).await {
            Ok(items) => items,
            Err(e) => {
                log_step_failure(self.name(), symbol, &e);
                return None;
            }
        };

        items
            .iter()
            .find(|t| t.symbol.eq_ignore_ascii_case(symbol))
            .or_else(|| items.first())
            .map(|t| t.address.clone())
    }
}

pub struct NameSearch {
    provider: Arc<dyn TokenProvider>,
    limit: usize,
}

impl NameSearch {
    pub fn new(provider: Arc<dyn TokenProvider>, limit: usize) -> Self {
        Self { provider, limit }
    }
}

#[async_trait]
impl ResolveStrategy for NameSearch {
    fn name(&self) -> &'static str {
        "name_search"
    }

    async fn resolve(&self, _symbol: &str, name: &str) -> Option<String> {
        if name.trim().is_empty() {
            return None;
        }

        match self.provider.search_tokens(Some(name), self.limit).await {
            Ok(items) => items.into_iter().next().map(|t| t.address),
            Err(e) => {
                log_step_failure(self.name(), name, &e);
                None
            }
        }
    }
}

pub struct LiquidityScan {
    provider: Arc<dyn TokenProvider>,
    limit: usize,
}

impl LiquidityScan {
    pub fn new(provider: Arc<dyn TokenProvider>, limit: usize) -> Self {
        Self { provider, limit }
    }
}

/// Loose, case-insensitive match: equal symbols, the target symbol inside the
/// listed name, or the listed symbol inside the target name.
///
/// Short tickers can match unrelated names here. Listings with an empty symbol
/// are skipped since they would otherwise match every target name.
pub fn loose_match(candidate: &ListedToken, symbol: &str, name: &str) -> bool {
    let cand_symbol = candidate.symbol.trim().to_uppercase();
    if cand_symbol.is_empty() {
        return false;
    }

    let symbol = symbol.to_uppercase();
    cand_symbol == symbol
        || (!symbol.is_empty() && candidate.name.to_uppercase().contains(&symbol))
        || name.to_uppercase().contains(&cand_symbol)
}

#[async_trait]
impl ResolveStrategy for LiquidityScan {
    fn name(&self) -> &'static str {
        "liquidity_scan"
    }

    async fn resolve(&self, symbol: &str, name: &str) -> Option<String> {
        match self.provider.search_tokens(None, self.limit).await {
            Ok(items) => items
                .into_iter()
                .find(|t| loose_match(t, symbol, name))
                .map(|t| t.address),
            Err(e) => {
                log_step_failure(self.name(), symbol, &e);
                None
            }
        }
    }
}

/// Ordered strategy chain
pub struct AddressResolver {
    strategies: Vec<Box<dyn ResolveStrategy>>,
}

impl AddressResolver {
    pub fn new(strategies: Vec<Box<dyn ResolveStrategy>>) -> Self {
        Self { strategies }
    }

    /// Static table only
    pub fn known_only() -> Self {
        Self::new(vec![Box::new(KnownTable)])
    }

    /// Full cascade when the provider has credentials, static table otherwise
    pub fn with_provider(provider: Option<Arc<dyn TokenProvider>>, limits: SearchLimits) -> Self {
        match provider {
            Some(provider) if provider.has_credentials() => Self::new(vec![
                Box::new(KnownTable),
                Box::new(SymbolSearch::new(provider.clone(), limits.symbol_search)),
                Box::new(NameSearch::new(provider.clone(), limits.name_search)),
                Box::new(LiquidityScan::new(provider, limits.scan)),
            ]),
            _ => {
                tracing::warn!("No token provider credentials, resolving from known table only");
                Self::known_only()
            }
        }
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    pub async fn resolve_address(&self, symbol: &str, name: &str) -> Option<String> {
        let symbol = symbol.trim().to_uppercase();

        for strategy in &self.strategies {
            if let Some(address) = strategy.resolve(&symbol, name).await {
                tracing::debug!(symbol = %symbol, step = strategy.name(), "Mint resolved");
                return Some(address);
            }
        }
        None
    }

    /// Resolve every listing into a ranked record. Unresolved tokens are kept
    /// with no address. Ranks follow input order starting at 1.
    pub async fn resolve_entries(&self, entries: Vec<MarketEntry>) -> Vec<TokenRecord> {
        let mut records = Vec::with_capacity(entries.len());

        for (idx, entry) in entries.into_iter().enumerate() {
            let symbol = entry.symbol.trim().to_uppercase();
            let mint = self.resolve_address(&symbol, &entry.name).await;

            match &mint {
                Some(address) => tracing::info!(
                    symbol = %symbol,
                    mint = %address.chars().take(8).collect::<String>(),
                    "Found mint address"
                ),
                None => tracing::warn!(symbol = %symbol, name = %entry.name, "No mint address found"),
            }

            records.push(TokenRecord {
                rank: idx as u32 + 1,
                links: TokenLinks::derive(mint.as_deref(), &symbol, &entry.id),
                name: entry.name,
                symbol,
                coingecko_id: entry.id,
                mint_address: mint,
                market_cap: entry.market_cap.unwrap_or(0.0).max(0.0),
                volume_24h: entry.total_volume.unwrap_or(0.0).max(0.0),
                price: entry.current_price,
                price_change_24h: entry.price_change_percentage_24h,
            });
        }

        records
    }

    /// Resolve listings into a snapshot stamped with the current time
    pub async fn build_snapshot(&self, entries: Vec<MarketEntry>) -> DatasetSnapshot {
        DatasetSnapshot::now(self.resolve_entries(entries).await)
    }
}

impl Default for AddressResolver {
    fn default() -> Self {
        Self::known_only()
    }
}

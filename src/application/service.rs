//! Token Feed
//!
//! Facade over the cache, scheduler, broadcaster and token provider. This is
//! the surface an HTTP layer would call into.

use std::sync::Arc;

use thiserror::Error;

use super::broadcaster::{LastBroadcast, WebhookBroadcaster, WebhookError};
use super::cache::TokenCache;
use super::scheduler::{CycleOutcome, RefreshScheduler, SchedulerStatus};
use crate::domain::{is_valid_mint, DatasetSnapshot, HolderReport, TokenRecord};
use crate::ports::TokenProvider;

/// Largest token listing served from the snapshot
pub const MAX_TOKEN_LIMIT: usize = 200;
/// Largest holder page requested from the provider
pub const MAX_HOLDER_LIMIT: usize = 100;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FeedError {
    #[error("Limit must be between 1 and {max}, got {limit}")]
    InvalidLimit { limit: usize, max: usize },
}

pub struct TokenFeed {
    scheduler: Arc<RefreshScheduler>,
    provider: Option<Arc<dyn TokenProvider>>,
}

impl TokenFeed {
    pub fn new(scheduler: Arc<RefreshScheduler>, provider: Option<Arc<dyn TokenProvider>>) -> Self {
        Self { scheduler, provider }
    }

    pub fn scheduler(&self) -> &Arc<RefreshScheduler> {
        &self.scheduler
    }

    fn cache(&self) -> &TokenCache {
        self.scheduler.cache()
    }

    fn broadcaster(&self) -> &WebhookBroadcaster {
        self.scheduler.broadcaster()
    }

    /// Current cache contents, possibly empty
    pub fn snapshot(&self) -> Arc<DatasetSnapshot> {
        self.cache().get()
    }

    /// First `limit` tokens of the current snapshot
    pub fn tokens(&self, limit: usize) -> Result<Vec<TokenRecord>, FeedError> {
        check_limit(limit)?;
        Ok(self.snapshot().top(limit))
    }

    /// Cached tokens when allowed and fresh, otherwise a new fetch that also
    /// replaces the cache. An empty fetch leaves the cache alone.
    pub async fn top_tokens(&self, limit: usize, use_cache: bool) -> Result<Vec<TokenRecord>, FeedError> {
        check_limit(limit)?;

        if use_cache && self.cache().is_valid() {
            tracing::info!("Using cached token data");
            return Ok(self.snapshot().top(limit));
        }

        match self.scheduler.fetch_snapshot(limit).await {
            Some(snapshot) => Ok(self.cache().put(snapshot).top(limit)),
            None => {
                tracing::warn!("No market data received");
                Ok(Vec::new())
            }
        }
    }

    /// Holder listing with per-holder shares and summary stats.
    /// `None` when there is no credential, the address is invalid, the
    /// provider failed, or it returned no holders.
    pub async fn holders(&self, address: &str, limit: usize) -> Option<HolderReport> {
        let provider = match &self.provider {
            Some(p) if p.has_credentials() => p,
            _ => {
                tracing::warn!("No token provider credentials, holder data unavailable");
                return None;
            }
        };

        if !is_valid_mint(address) {
            tracing::warn!(address = %address, "Rejected holder lookup for invalid mint address");
            return None;
        }

        let limit = limit.clamp(1, MAX_HOLDER_LIMIT);
        match provider.token_holders(address, limit).await {
            Ok(balances) => HolderReport::from_balances(balances),
            Err(e) => {
                tracing::error!(address = %address, "Failed to fetch holders: {}", e);
                None
            }
        }
    }

    pub async fn register_webhook(&self, url: &str) -> Result<(), WebhookError> {
        self.broadcaster().register(url).await
    }

    pub async fn unregister_webhook(&self, url: &str) -> Result<(), WebhookError> {
        self.broadcaster().unregister(url).await
    }

    pub async fn list_webhooks(&self) -> Vec<String> {
        self.broadcaster().list().await
    }

    pub async fn last_broadcast(&self) -> Option<LastBroadcast> {
        self.broadcaster().last_broadcast().await
    }

    /// Out-of-band cycle, ignoring cache freshness
    pub async fn force_refresh(&self) -> CycleOutcome {
        tracing::info!("Manual refresh requested");
        self.scheduler.run_cycle().await
    }

    pub async fn status(&self) -> SchedulerStatus {
        self.scheduler.status().await
    }
}

fn check_limit(limit: usize) -> Result<(), FeedError> {
    if (1..=MAX_TOKEN_LIMIT).contains(&limit) {
        Ok(())
    } else {
        Err(FeedError::InvalidLimit {
            limit,
            max: MAX_TOKEN_LIMIT,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::broadcaster::RetryPolicy;
    use crate::application::resolver::AddressResolver;
    use crate::application::scheduler::SchedulerConfig;
    use crate::domain::token::fixtures::record;
    use crate::domain::HolderBalance;
    use crate::ports::mocks::{MemoryStore, MockMarketData, MockTokenProvider, MockTransport};
    use crate::ports::MarketEntry;
    use std::time::Duration;

    const BONK_MINT: &str = "DezXAZ8z7PnrnRJjz3wXBoRgixCa6xjnB7YaB1pPB263";

    fn feed(market: MockMarketData, provider: Option<Arc<dyn TokenProvider>>) -> (TokenFeed, Arc<MockMarketData>) {
        let market = Arc::new(market);
        let cache = Arc::new(TokenCache::new(Arc::new(MemoryStore::new()), Duration::from_secs(3600)));
        let broadcaster = Arc::new(WebhookBroadcaster::new(
            Arc::new(MockTransport::new()),
            RetryPolicy::default(),
            300,
        ));
        let scheduler = Arc::new(RefreshScheduler::new(
            market.clone(),
            Arc::new(AddressResolver::known_only()),
            cache,
            broadcaster,
            SchedulerConfig::default(),
        ));
        (TokenFeed::new(scheduler, provider), market)
    }

    fn market_entries(n: usize) -> Vec<MarketEntry> {
        (0..n)
            .map(|i| {
                let id = format!("token-{}", i);
                MarketEntry::new(&id, &format!("Token {}", i), &format!("t{}", i), 1e6 - i as f64, 1e4)
            })
            .collect()
    }

    fn balance(owner: &str, ui_amount: f64) -> HolderBalance {
        HolderBalance {
            owner: owner.to_string(),
            token_account: None,
            amount: format!("{}", ui_amount as u64 * 1_000_000),
            ui_amount,
            decimals: 6,
        }
    }

    #[test]
    fn test_tokens_limit_bounds() {
        let (feed, _) = feed(MockMarketData::new(), None);
        assert_eq!(feed.tokens(0), Err(FeedError::InvalidLimit { limit: 0, max: 200 }));
        assert_eq!(feed.tokens(201), Err(FeedError::InvalidLimit { limit: 201, max: 200 }));
        assert_eq!(feed.tokens(200), Ok(Vec::new()));
    }

    #[tokio::test]
    async fn test_top_tokens_never_exceeds_limit() {
        let (feed, _) = feed(MockMarketData::new().with_entries(market_entries(250)), None);

        for limit in [1, 7, 50, 199, 200] {
            let tokens = feed.top_tokens(limit, false).await.unwrap();
            assert_eq!(tokens.len(), limit);
            let ranks: Vec<u32> = tokens.iter().map(|t| t.rank).collect();
            let expected: Vec<u32> = (1..=limit as u32).collect();
            assert_eq!(ranks, expected);
        }
    }

    #[tokio::test]
    async fn test_top_tokens_uses_fresh_cache() {
        let (feed, market) = feed(MockMarketData::new().with_entries(market_entries(5)), None);
        feed.cache().put(DatasetSnapshot::now(vec![record(1, "SOL", None, 1.0, 1.0)]));

        let cached = feed.top_tokens(10, true).await.unwrap();
        assert_eq!(cached.len(), 1);
        assert!(market.get_calls().is_empty());

        let fresh = feed.top_tokens(10, false).await.unwrap();
        assert_eq!(fresh.len(), 5);
        assert_eq!(feed.snapshot().len(), 5);
    }

    #[tokio::test]
    async fn test_holders_report() {
        let provider = Arc::new(MockTokenProvider::new().with_holders(
            BONK_MINT,
            vec![balance("A", 100.0), balance("B", 50.0), balance("C", 50.0)],
        ));
        let (feed, _) = feed(MockMarketData::new(), Some(provider.clone()));

        let report = feed.holders(BONK_MINT, 500).await.unwrap();

        assert_eq!(report.stats.total_holders, 3);
        assert_eq!(report.stats.total_supply, 200.0);
        assert_eq!(report.stats.largest_balance, 100.0);
        assert_eq!(
            report.holders.iter().map(|h| h.percentage).collect::<Vec<_>>(),
            vec![50.0, 25.0, 25.0]
        );
        // Limit clamped to the provider maximum
        assert_eq!(provider.holder_calls(), vec![(BONK_MINT.to_string(), 100)]);
    }

    #[tokio::test]
    async fn test_holders_unavailable() {
        let (no_provider, _) = feed(MockMarketData::new(), None);
        assert!(no_provider.holders(BONK_MINT, 10).await.is_none());

        let keyless = Arc::new(MockTokenProvider::without_credentials());
        let (feed_keyless, _) = feed(MockMarketData::new(), Some(keyless.clone()));
        assert!(feed_keyless.holders(BONK_MINT, 10).await.is_none());
        assert_eq!(keyless.call_count(), 0);

        let provider = Arc::new(MockTokenProvider::new());
        let (feed, _) = feed(MockMarketData::new(), Some(provider.clone()));
        assert!(feed.holders("not-a-mint", 10).await.is_none());
        assert_eq!(provider.call_count(), 0);

        // Valid address, no holders returned
        assert!(feed.holders(BONK_MINT, 10).await.is_none());
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_webhook_surface_and_force_refresh() {
        let (feed, _) = feed(MockMarketData::new().with_entries(market_entries(3)), None);

        feed.register_webhook("https://a.example/hook").await.unwrap();
        assert!(feed.register_webhook("https://a.example/hook").await.is_err());
        assert_eq!(feed.list_webhooks().await, vec!["https://a.example/hook".to_string()]);

        let outcome = feed.force_refresh().await;
        assert!(outcome.is_refreshed());
        assert_eq!(feed.snapshot().len(), 3);
        assert_eq!(feed.last_broadcast().await.map(|l| l.result.sent), Some(1));

        feed.unregister_webhook("https://a.example/hook").await.unwrap();
        assert!(feed.unregister_webhook("https://a.example/hook").await.is_err());
    }
}

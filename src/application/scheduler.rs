//! Refresh Scheduler
//!
//! Background loop: fetch -> resolve -> cache -> broadcast, then sleep.
//! - Empty fetches count as failures; at the threshold the cache is cleared
//!   and the counter starts over
//! - `stop()` interrupts the inter-cycle sleep; a running cycle completes
//! - `run_cycle()` is also the out-of-band refresh entry point. Cycles never
//!   overlap.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{watch, Mutex, RwLock};

use super::broadcaster::{BroadcastResult, WebhookBroadcaster};
use super::cache::TokenCache;
use super::resolver::AddressResolver;
use crate::domain::DatasetSnapshot;
use crate::ports::MarketDataSource;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SchedulerError {
    #[error("Scheduler is already running")]
    AlreadyRunning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedulerState {
    Idle,
    Fetching,
    Resolving,
    Broadcasting,
    Sleeping,
}

impl std::fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SchedulerState::Idle => "idle",
            SchedulerState::Fetching => "fetching",
            SchedulerState::Resolving => "resolving",
            SchedulerState::Broadcasting => "broadcasting",
            SchedulerState::Sleeping => "sleeping",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Tokens requested per cycle
    pub token_count: usize,
    /// Sleep between cycles
    pub interval: Duration,
    /// Consecutive failed cycles before the cache is reset
    pub max_consecutive_failures: u32,
    /// Skip the first cycle when a fresh cache was restored at start
    pub skip_initial_if_fresh: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            token_count: 100,
            interval: Duration::from_secs(300),
            max_consecutive_failures: 3,
            skip_initial_if_fresh: true,
        }
    }
}

/// Result of one cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Cache replaced and broadcast sent
    Refreshed {
        tokens: usize,
        broadcast: BroadcastResult,
    },
    /// Nothing fetched; previous snapshot kept
    Failed { consecutive_failures: u32 },
    /// Failure threshold reached; cache cleared and counter reset
    CacheReset,
}

impl CycleOutcome {
    pub fn is_refreshed(&self) -> bool {
        matches!(self, CycleOutcome::Refreshed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerStatus {
    pub is_running: bool,
    pub state: SchedulerState,
    pub consecutive_failures: u32,
    pub cycles_run: u64,
    /// Unix seconds of the last successful refresh
    pub last_success: Option<i64>,
    pub last_broadcast: Option<BroadcastResult>,
}

impl Default for SchedulerStatus {
    fn default() -> Self {
        Self {
            is_running: false,
            state: SchedulerState::Idle,
            consecutive_failures: 0,
            cycles_run: 0,
            last_success: None,
            last_broadcast: None,
        }
    }
}

pub struct RefreshScheduler {
    market: Arc<dyn MarketDataSource>,
    resolver: Arc<AddressResolver>,
    cache: Arc<TokenCache>,
    broadcaster: Arc<WebhookBroadcaster>,
    config: SchedulerConfig,
    status: RwLock<SchedulerStatus>,
    cycle_lock: Mutex<()>,
    running: AtomicBool,
    shutdown: watch::Sender<bool>,
}

/// Clears the running flag and any consumed stop request when `run()`
/// returns or its future is dropped
struct RunGuard<'a> {
    scheduler: &'a RefreshScheduler,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.scheduler.shutdown.send_replace(false);
        self.scheduler.running.store(false, Ordering::SeqCst);
        if let Ok(mut status) = self.scheduler.status.try_write() {
            status.state = SchedulerState::Idle;
        }
    }
}

impl RefreshScheduler {
    pub fn new(
        market: Arc<dyn MarketDataSource>,
        resolver: Arc<AddressResolver>,
        cache: Arc<TokenCache>,
        broadcaster: Arc<WebhookBroadcaster>,
        config: SchedulerConfig,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            market,
            resolver,
            cache,
            broadcaster,
            config,
            status: RwLock::new(SchedulerStatus::default()),
            cycle_lock: Mutex::new(()),
            running: AtomicBool::new(false),
            shutdown,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<TokenCache> {
        &self.cache
    }

    pub fn broadcaster(&self) -> &Arc<WebhookBroadcaster> {
        &self.broadcaster
    }

    pub async fn status(&self) -> SchedulerStatus {
        let mut status = self.status.read().await.clone();
        status.is_running = self.running.load(Ordering::SeqCst);
        status
    }

    pub async fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    async fn set_state(&self, state: SchedulerState) {
        self.status.write().await.state = state;
    }

    /// Fetch and resolve `count` tokens without touching the cache.
    /// `None` when the market source returned nothing.
    pub async fn fetch_snapshot(&self, count: usize) -> Option<DatasetSnapshot> {
        let entries = self.market.fetch_top_tokens(count).await;
        if entries.is_empty() {
            return None;
        }
        Some(self.resolver.build_snapshot(entries).await)
    }

    /// One full cycle, bypassing cache freshness
    pub async fn run_cycle(&self) -> CycleOutcome {
        let _cycle = self.cycle_lock.lock().await;
        tracing::info!("Starting token data update");

        self.set_state(SchedulerState::Fetching).await;
        let entries = self.market.fetch_top_tokens(self.config.token_count).await;
        if entries.is_empty() {
            return self.record_failure().await;
        }

        self.set_state(SchedulerState::Resolving).await;
        let snapshot = self.resolver.build_snapshot(entries).await;
        let snapshot = self.cache.put(snapshot);

        let totals = snapshot.totals();
        tracing::info!(
            tokens = snapshot.len(),
            with_mint = snapshot.resolved_count(),
            total_market_cap = totals.total_market_cap,
            "Token data updated"
        );

        self.set_state(SchedulerState::Broadcasting).await;
        let broadcast = self.broadcaster.broadcast(&snapshot).await;

        let mut status = self.status.write().await;
        status.state = SchedulerState::Idle;
        status.consecutive_failures = 0;
        status.cycles_run += 1;
        status.last_success = Some(snapshot.captured_at);
        status.last_broadcast = Some(broadcast);

        CycleOutcome::Refreshed {
            tokens: snapshot.len(),
            broadcast,
        }
    }

    async fn record_failure(&self) -> CycleOutcome {
        let mut status = self.status.write().await;
        status.state = SchedulerState::Idle;
        status.cycles_run += 1;
        status.consecutive_failures += 1;

        let failures = status.consecutive_failures;
        let threshold = self.config.max_consecutive_failures;
        tracing::warn!("No tokens fetched in update cycle ({}/{})", failures, threshold);

        if failures >= threshold {
            tracing::error!("Too many consecutive failures, clearing cache");
            self.cache.clear();
            status.consecutive_failures = 0;
            return CycleOutcome::CacheReset;
        }

        CycleOutcome::Failed {
            consecutive_failures: failures,
        }
    }

    /// Request the loop to exit. A pending sleep returns immediately; a stop
    /// issued before `run()` starts makes it return without a cycle.
    pub fn stop(&self) {
        tracing::info!("Scheduler stop requested");
        self.shutdown.send_replace(true);
    }

    /// Run cycles until `stop()` is called
    pub async fn run(&self) -> Result<(), SchedulerError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SchedulerError::AlreadyRunning);
        }
        let _guard = RunGuard { scheduler: self };
        let mut shutdown = self.shutdown.subscribe();

        tracing::info!(
            interval_secs = self.config.interval.as_secs(),
            token_count = self.config.token_count,
            "Starting refresh scheduler"
        );

        let mut skip_next = self.config.skip_initial_if_fresh && self.cache.is_valid();

        while !*shutdown.borrow() {
            if skip_next {
                skip_next = false;
                tracing::info!("Cache is fresh, skipping initial refresh");
            } else {
                self.run_cycle().await;
            }

            self.set_state(SchedulerState::Sleeping).await;
            tracing::info!("Waiting {} seconds until next update", self.config.interval.as_secs());

            tokio::select! {
                _ = tokio::time::sleep(self.config.interval) => {}
                _ = shutdown.changed() => {
                    tracing::info!("Sleep interrupted by shutdown");
                }
            }
        }

        self.set_state(SchedulerState::Idle).await;
        tracing::info!("Refresh scheduler stopped");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::broadcaster::RetryPolicy;
    use crate::domain::token::fixtures::record;
    use crate::ports::mocks::{MemoryStore, MockMarketData, MockTransport};
    use crate::ports::MarketEntry;

    struct Harness {
        market: Arc<MockMarketData>,
        store: Arc<MemoryStore>,
        transport: MockTransport,
        scheduler: Arc<RefreshScheduler>,
    }

    fn harness(market: MockMarketData) -> Harness {
        let market = Arc::new(market);
        let store = Arc::new(MemoryStore::new());
        let transport = MockTransport::new();
        let cache = Arc::new(TokenCache::new(store.clone(), Duration::from_secs(3600)));
        let broadcaster = Arc::new(WebhookBroadcaster::new(
            Arc::new(transport.clone()),
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

        Harness {
            market,
            store,
            transport,
            scheduler,
        }
    }

    fn entries() -> Vec<MarketEntry> {
        vec![
            MarketEntry::new("solana", "Solana", "sol", 68e9, 2e9),
            MarketEntry::new("bonk", "Bonk", "bonk", 1.5e9, 1.2e8),
        ]
    }

    #[tokio::test]
    async fn test_successful_cycle() {
        let h = harness(MockMarketData::new().with_entries(entries()));
        h.scheduler.broadcaster().register("https://hook.example").await.unwrap();

        let outcome = h.scheduler.run_cycle().await;

        assert_eq!(
            outcome,
            CycleOutcome::Refreshed {
                tokens: 2,
                broadcast: BroadcastResult { sent: 1, failed: 0 },
            }
        );
        assert_eq!(h.market.get_calls(), vec![100]);
        assert_eq!(h.scheduler.cache().get().len(), 2);
        assert_eq!(h.store.save_count(), 1);
        assert_eq!(h.transport.attempts("https://hook.example"), 1);

        let status = h.scheduler.status().await;
        assert_eq!(status.state, SchedulerState::Idle);
        assert_eq!(status.cycles_run, 1);
        assert!(status.last_success.is_some());
    }

    #[tokio::test]
    async fn test_empty_fetch_keeps_previous_snapshot() {
        let h = harness(MockMarketData::new());
        let previous = DatasetSnapshot::now(vec![record(1, "SOL", None, 1.0, 1.0)]);
        h.scheduler.cache().put(previous.clone());

        let outcome = h.scheduler.run_cycle().await;

        assert_eq!(outcome, CycleOutcome::Failed { consecutive_failures: 1 });
        assert_eq!(*h.scheduler.cache().get(), previous);
        assert!(h.transport.bodies().is_empty());
    }

    #[tokio::test]
    async fn test_three_failures_clear_cache_once() {
        let h = harness(MockMarketData::new());
        h.scheduler
            .cache()
            .put(DatasetSnapshot::now(vec![record(1, "SOL", None, 1.0, 1.0)]));

        assert_eq!(h.scheduler.run_cycle().await, CycleOutcome::Failed { consecutive_failures: 1 });
        assert_eq!(h.scheduler.run_cycle().await, CycleOutcome::Failed { consecutive_failures: 2 });
        assert_eq!(h.scheduler.run_cycle().await, CycleOutcome::CacheReset);

        assert_eq!(h.store.delete_count(), 1);
        assert_eq!(h.scheduler.status().await.consecutive_failures, 0);

        // The fourth cycle starts from a cleared cache and a fresh counter
        assert!(h.scheduler.cache().get().is_empty());
        assert_eq!(h.scheduler.run_cycle().await, CycleOutcome::Failed { consecutive_failures: 1 });
        assert_eq!(h.store.delete_count(), 1);
    }

    #[tokio::test]
    async fn test_success_resets_failure_counter() {
        let h = harness(MockMarketData::new().with_entries(entries()));
        h.market.push_response(Vec::new());
        h.market.push_response(Vec::new());

        h.scheduler.run_cycle().await;
        h.scheduler.run_cycle().await;
        assert_eq!(h.scheduler.status().await.consecutive_failures, 2);

        assert!(h.scheduler.run_cycle().await.is_refreshed());
        assert_eq!(h.scheduler.status().await.consecutive_failures, 0);
        assert_eq!(h.store.delete_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_interrupts_sleep() {
        let h = harness(MockMarketData::new().with_entries(entries()));
        let scheduler = h.scheduler.clone();
        let start = tokio::time::Instant::now();

        let handle = tokio::spawn(async move { scheduler.run().await });

        loop {
            let status = h.scheduler.status().await;
            if status.cycles_run == 1 && status.state == SchedulerState::Sleeping {
                break;
            }
            tokio::task::yield_now().await;
        }

        h.scheduler.stop();
        handle.await.unwrap().unwrap();

        assert!(start.elapsed() < Duration::from_secs(300));
        assert_eq!(h.market.get_calls().len(), 1);
        let status = h.scheduler.status().await;
        assert!(!status.is_running);
        assert_eq!(status.state, SchedulerState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_cache_skips_first_cycle() {
        let h = harness(MockMarketData::new().with_entries(entries()));
        h.scheduler
            .cache()
            .put(DatasetSnapshot::now(vec![record(1, "SOL", None, 1.0, 1.0)]));
        let scheduler = h.scheduler.clone();

        let handle = tokio::spawn(async move { scheduler.run().await });

        while h.scheduler.status().await.state != SchedulerState::Sleeping {
            tokio::task::yield_now().await;
        }

        h.scheduler.stop();
        handle.await.unwrap().unwrap();
        assert!(h.market.get_calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_before_run_is_honoured() {
        let h = harness(MockMarketData::new().with_entries(entries()));
        let scheduler = h.scheduler.clone();

        let handle = tokio::spawn(async move { scheduler.run().await });
        h.scheduler.stop();

        let joined = tokio::time::timeout(Duration::from_secs(3600), handle).await;
        joined.expect("scheduler ignored stop").unwrap().unwrap();

        assert!(h.market.get_calls().len() <= 1);
        assert!(!h.scheduler.is_running().await);

        // The consumed stop does not leak into the next run
        let scheduler = h.scheduler.clone();
        let handle = tokio::spawn(async move { scheduler.run().await });
        while h.scheduler.status().await.state != SchedulerState::Sleeping {
            tokio::task::yield_now().await;
        }
        assert!(h.scheduler.is_running().await);
        h.scheduler.stop();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_aborted_run_can_restart() {
        let h = harness(MockMarketData::new().with_entries(entries()));
        let scheduler = h.scheduler.clone();
        let handle = tokio::spawn(async move { scheduler.run().await });

        while h.scheduler.status().await.state != SchedulerState::Sleeping {
            tokio::task::yield_now().await;
        }
        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());

        let status = h.scheduler.status().await;
        assert!(!status.is_running);
        assert_eq!(status.state, SchedulerState::Idle);

        let scheduler = h.scheduler.clone();
        let handle = tokio::spawn(async move { scheduler.run().await });
        while !h.scheduler.is_running().await {
            tokio::task::yield_now().await;
        }
        h.scheduler.stop();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_twice_rejected() {
        let h = harness(MockMarketData::new().with_entries(entries()));
        let scheduler = h.scheduler.clone();
        let handle = tokio::spawn(async move { scheduler.run().await });

        while !h.scheduler.is_running().await {
            tokio::task::yield_now().await;
        }

        assert_eq!(h.scheduler.run().await, Err(SchedulerError::AlreadyRunning));
        h.scheduler.stop();
        handle.await.unwrap().unwrap();
    }
}

//! Application Layer - Refresh pipeline and the feed facade
//!
//! - `resolver`: Mint address cascade (known table -> search -> scan)
//! - `cache`: TTL-backed snapshot cache with durable persistence
//! - `broadcaster`: Webhook subscriber set and concurrent delivery
//! - `scheduler`: Periodic fetch/resolve/cache/broadcast loop
//! - `service`: `TokenFeed`, the surface exposed to callers

pub mod resolver;
pub mod cache;
pub mod broadcaster;
pub mod scheduler;
pub mod service;

pub use resolver::{
    loose_match, AddressResolver, KnownTable, LiquidityScan, NameSearch, ResolveStrategy,
    SearchLimits, SymbolSearch,
};
pub use cache::{CacheError, ExportReport, PersistedCache, TokenCache, DEFAULT_TTL_SECS};
pub use broadcaster::{
    validate_url, BroadcastResult, LastBroadcast, RetryPolicy, WebhookBroadcaster, WebhookError,
    WebhookPayload,
};
pub use scheduler::{
    CycleOutcome, RefreshScheduler, SchedulerConfig, SchedulerError, SchedulerState, SchedulerStatus,
};
pub use service::{FeedError, TokenFeed, MAX_HOLDER_LIMIT, MAX_TOKEN_LIMIT};

//! Solana Top Tokens - Market cap feed with mint resolution and webhook push
//!
//! Periodically fetches the top Solana ecosystem tokens, resolves each token's
//! mint address, caches the snapshot with a TTL and pushes it to subscribers.
//!
//! # Modules
//!
//! - `domain`: Core data (TokenRecord, DatasetSnapshot, HolderReport, known mints)
//! - `ports`: Trait abstractions (MarketDataSource, TokenProvider, CacheStore, WebhookTransport)
//! - `adapters`: External implementations (CoinGecko, BirdEye, file store, HTTP webhooks, CLI)
//! - `config`: Configuration loading and validation
//! - `application`: Resolver, cache, broadcaster, scheduler and the `TokenFeed` facade

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod config;
pub mod application;

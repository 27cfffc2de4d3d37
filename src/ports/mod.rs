//! Ports Layer - Trait definitions for external dependencies
//!
//! Following hexagonal architecture, these traits abstract:
//! - Ranked market listings (CoinGecko)
//! - Token search and holder listings (BirdEye)
//! - Durable cache storage
//! - Webhook delivery

pub mod market_data;
pub mod token_provider;
pub mod store;
pub mod webhook;
pub mod mocks;

pub use market_data::{MarketDataSource, MarketEntry};
pub use token_provider::{ListedToken, ProviderError, TokenProvider};
pub use store::{CacheStore, StoreError};
pub use webhook::{DeliveryError, WebhookTransport};

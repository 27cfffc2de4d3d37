//! Adapters Layer - External System Implementations
//!
//! This module contains implementations of the port traits:
//! - CoinGecko: ranked market listings
//! - BirdEye: token search and holder listings
//! - Rate limit: sliding-window limiter shared by BirdEye calls
//! - Storage: file-backed cache store
//! - Webhook: HTTP delivery to subscribers
//! - CLI: Command-line interface definitions

pub mod coingecko;
pub mod birdeye;
pub mod rate_limit;
pub mod storage;
pub mod webhook;
pub mod cli;

pub use coingecko::CoinGeckoClient;
pub use birdeye::BirdeyeClient;
pub use rate_limit::{RateLimiter, RateLimiterConfig};
pub use storage::FileStore;
pub use webhook::HttpWebhookTransport;
pub use cli::CliApp;

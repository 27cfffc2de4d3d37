//! CoinGecko Adapter
//!
//! Market-data source for ranked Solana ecosystem listings.

mod client;

pub use client::{parse_markets, CoinGeckoClient, CoinGeckoConfig, MarketDataError, MAX_PER_PAGE};

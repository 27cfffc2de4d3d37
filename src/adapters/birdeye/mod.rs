//! BirdEye Adapter
//!
//! Secondary token provider used for:
//! - Mint address lookups (token list search by symbol/name, liquidity scan)
//! - Holder listings for a mint
//!
//! Requires `BIRDEYE_API_KEY`. Without it every call returns
//! `ProviderError::MissingCredentials` and no request is made.

mod client;
mod types;

pub use client::{BirdeyeClient, BirdeyeConfig, API_KEY_ENV};
pub use types::{BirdeyeResponse, HolderItem, ItemsData, TokenListItem};

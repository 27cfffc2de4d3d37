//! Domain Layer - Core data for the token feed
//!
//! Pure types with no I/O. External interactions happen through the ports layer.
//! - `token`: Token records, dataset snapshots, totals, explorer links
//! - `holder`: Holder balances and per-request statistics
//! - `known_mints`: Static well-known mint table and mint validation

pub mod token;
pub mod holder;
pub mod known_mints;

pub use token::{now_unix, DatasetSnapshot, TokenLinks, TokenRecord, Totals};
pub use holder::{HolderBalance, HolderRecord, HolderReport, HolderSummary};
pub use known_mints::{is_valid_mint, known_mint, KNOWN_MINTS, SOL_MINT, USDC_MINT};

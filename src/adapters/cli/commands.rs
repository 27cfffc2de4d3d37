//! CLI Command Definitions
//!
//! Argument structures for the token feed binary.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Top Solana tokens feed
#[derive(Parser, Debug)]
#[command(
    name = "solana-top-tokens",
    version = env!("CARGO_PKG_VERSION"),
    author = env!("CARGO_PKG_AUTHORS"),
    about = "Top Solana tokens by market cap, with mint addresses and webhook push",
    long_about = "Fetches the top Solana ecosystem tokens by market cap, resolves each token's \
                  mint address through a cascade of lookups, caches the result and pushes \
                  every refresh to registered webhooks."
)]
pub struct CliApp {
    /// The command to execute
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the refresh loop
    Run(RunCmd),

    /// Run one refresh cycle and print the result
    Fetch(FetchCmd),

    /// Show the top holders of a token
    Holders(HoldersCmd),

    /// Inspect or clear the persisted cache
    Cache(CacheCmd),
}

/// Start the refresh loop
#[derive(Parser, Debug)]
pub struct RunCmd {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
    pub config: PathBuf,
}

/// One forced refresh cycle
#[derive(Parser, Debug)]
pub struct FetchCmd {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
    pub config: PathBuf,

    /// Number of tokens to fetch (overrides market_data.token_count)
    #[arg(short, long, value_name = "N")]
    pub limit: Option<usize>,

    /// Print the snapshot as JSON
    #[arg(long)]
    pub json: bool,
}

/// Holder listing for one mint
#[derive(Parser, Debug)]
pub struct HoldersCmd {
    /// Token mint address
    #[arg(value_name = "ADDRESS")]
    pub address: String,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
    pub config: PathBuf,

    /// Number of holders to fetch (1-100)
    #[arg(short, long, value_name = "N", default_value = "50")]
    pub limit: usize,
}

/// Cache maintenance
#[derive(Parser, Debug)]
pub struct CacheCmd {
    #[command(subcommand)]
    pub action: CacheAction,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config.toml", global = true)]
    pub config: PathBuf,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheAction {
    /// Show persisted cache age and validity
    Status,
    /// Delete the persisted cache
    Clear,
}

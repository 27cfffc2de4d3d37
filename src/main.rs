//! Solana Top Tokens - binary entry point

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing_subscriber::{fmt, EnvFilter};

use solana_top_tokens::adapters::birdeye::BirdeyeClient;
use solana_top_tokens::adapters::cli::{self, CacheAction, CacheCmd, Command, FetchCmd, HoldersCmd, RunCmd};
use solana_top_tokens::adapters::coingecko::CoinGeckoClient;
use solana_top_tokens::adapters::rate_limit::RateLimiter;
use solana_top_tokens::adapters::storage::FileStore;
use solana_top_tokens::adapters::webhook::HttpWebhookTransport;
use solana_top_tokens::application::{
    AddressResolver, CycleOutcome, RefreshScheduler, TokenCache, TokenFeed, WebhookBroadcaster,
};
use solana_top_tokens::config::{load_config_or_default, Config};
use solana_top_tokens::domain::{now_unix, DatasetSnapshot};
use solana_top_tokens::ports::TokenProvider;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (BIRDEYE_API_KEY goes here, not in config.toml)
    dotenvy::dotenv().ok();

    let app = cli::init();

    match app.command {
        Command::Run(cmd) => run_command(cmd, app.verbose, app.debug).await,
        Command::Fetch(cmd) => fetch_command(cmd, app.verbose, app.debug).await,
        Command::Holders(cmd) => holders_command(cmd, app.verbose, app.debug).await,
        Command::Cache(cmd) => cache_command(cmd, app.verbose, app.debug).await,
    }
}

/// `--debug` > `--verbose` > config level. RUST_LOG wins over all of them.
fn init_logging(verbose: bool, debug: bool, config_level: &str) -> Result<()> {
    let level = if debug {
        "debug"
    } else if verbose {
        "info"
    } else {
        config_level
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialise logging: {}", e))?;

    Ok(())
}

fn setup(config_path: &std::path::Path, verbose: bool, debug: bool) -> Result<Config> {
    let config = load_config_or_default(config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path.display()))?;
    init_logging(verbose, debug, &config.logging.level)?;
    Ok(config)
}

fn build_cache(config: &Config) -> Arc<TokenCache> {
    let store = Arc::new(FileStore::new(config.cache.path()));
    let mut cache = TokenCache::new(store, config.cache.ttl());
    if let Some(export) = config.cache.export_path() {
        cache = cache.with_export(Arc::new(FileStore::new(export)));
    }
    Arc::new(cache)
}

/// Wire adapters into the feed
async fn build_feed(config: &Config) -> Result<TokenFeed> {
    let market = CoinGeckoClient::with_config(config.market_data.client_config())
        .context("Failed to create CoinGecko client")?;

    let limiter = Arc::new(RateLimiter::new(config.birdeye.rate_limiter_config()));
    let birdeye = BirdeyeClient::new(config.birdeye.client_config(), limiter)
        .context("Failed to create BirdEye client")?;
    let provider: Arc<dyn TokenProvider> = Arc::new(birdeye);

    let resolver = AddressResolver::with_provider(Some(provider.clone()), config.birdeye.search_limits());
    tracing::info!("Mint resolution chain: {}", resolver.strategy_names().join(" -> "));

    let transport = HttpWebhookTransport::new(config.webhooks.timeout())
        .context("Failed to create webhook transport")?;
    let broadcaster = WebhookBroadcaster::new(
        Arc::new(transport),
        config.webhooks.retry_policy(),
        config.scheduler.interval_secs,
    );
    for url in &config.webhooks.urls {
        if let Err(e) = broadcaster.register(url).await {
            tracing::warn!("Skipping configured webhook: {}", e);
        }
    }

    let scheduler = RefreshScheduler::new(
        Arc::new(market),
        Arc::new(resolver),
        build_cache(config),
        Arc::new(broadcaster),
        config.scheduler_config(),
    );

    Ok(TokenFeed::new(Arc::new(scheduler), Some(provider)))
}

async fn run_command(cmd: RunCmd, verbose: bool, debug: bool) -> Result<()> {
    let config = setup(&cmd.config, verbose, debug)?;
    tracing::info!("Starting token feed...");

    let feed = build_feed(&config).await?;
    let scheduler = feed.scheduler().clone();
    scheduler.cache().load();

    // Setup Ctrl+C handler
    let sched = scheduler.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Shutdown signal received");
        sched.stop();
    });

    scheduler.run().await?;
    tracing::info!("Token feed stopped");
    Ok(())
}

async fn fetch_command(cmd: FetchCmd, verbose: bool, debug: bool) -> Result<()> {
    let mut config = setup(&cmd.config, verbose, debug)?;
    if let Some(limit) = cmd.limit {
        config.market_data.token_count = limit;
        config.validate().context("Invalid --limit")?;
    }

    let feed = build_feed(&config).await?;
    match feed.force_refresh().await {
        CycleOutcome::Refreshed { broadcast, .. } if broadcast.sent + broadcast.failed > 0 => {
            tracing::info!("Broadcast: {} sent, {} failed", broadcast.sent, broadcast.failed);
        }
        CycleOutcome::Refreshed { .. } => {}
        _ => bail!("No market data received"),
    }

    let snapshot = feed.snapshot();
    if cmd.json {
        println!("{}", serde_json::to_string_pretty(snapshot.as_ref())?);
    } else {
        print_snapshot(&snapshot);
    }
    Ok(())
}

fn print_snapshot(snapshot: &DatasetSnapshot) {
    println!("{:>4}  {:<10} {:<24} {:>18} {:>16}  {}", "#", "SYMBOL", "NAME", "MARKET CAP", "VOLUME 24H", "MINT");
    for t in &snapshot.tokens {
        let name: String = t.name.chars().take(24).collect();
        println!(
            "{:>4}  {:<10} {:<24} {:>18.0} {:>16.0}  {}",
            t.rank,
            t.symbol,
            name,
            t.market_cap,
            t.volume_24h,
            t.mint_address.as_deref().unwrap_or("-")
        );
    }

    let totals = snapshot.totals();
    println!();
    println!(
        "{} tokens ({} with mint), total market cap ${:.0}, 24h volume ${:.0}",
        snapshot.len(),
        snapshot.resolved_count(),
        totals.total_market_cap,
        totals.total_volume_24h
    );
}

async fn holders_command(cmd: HoldersCmd, verbose: bool, debug: bool) -> Result<()> {
    let config = setup(&cmd.config, verbose, debug)?;
    let feed = build_feed(&config).await?;

    let Some(report) = feed.holders(&cmd.address, cmd.limit).await else {
        bail!("Holder data unavailable for {} (check BIRDEYE_API_KEY and the address)", cmd.address);
    };

    println!("{:>4}  {:<44} {:>20} {:>8}", "#", "OWNER", "BALANCE", "SHARE");
    for (i, h) in report.holders.iter().enumerate() {
        println!("{:>4}  {:<44} {:>20.4} {:>7.2}%", i + 1, h.owner, h.ui_amount, h.percentage);
    }

    let stats = report.stats;
    println!();
    println!("Holders:         {}", stats.total_holders);
    println!("Observed supply: {:.4}", stats.total_supply);
    println!("Largest balance: {:.4}", stats.largest_balance);
    println!("Average balance: {:.4}", stats.average_balance);
    Ok(())
}

async fn cache_command(cmd: CacheCmd, verbose: bool, debug: bool) -> Result<()> {
    let config = setup(&cmd.config, verbose, debug)?;
    let cache = build_cache(&config);

    match cmd.action {
        CacheAction::Status => {
            println!("Cache file: {}", config.cache.path().display());
            match cache.read_persisted().context("Failed to read cache")? {
                None => println!("Status:     empty"),
                Some(snapshot) => {
                    let age = snapshot.age_secs(now_unix());
                    let valid = age < i64::try_from(config.cache.ttl_secs).unwrap_or(i64::MAX);
                    println!("Status:     {}", if valid { "valid" } else { "expired" });
                    println!("Age:        {}s (ttl {}s)", age, config.cache.ttl_secs);
                    println!("Tokens:     {} ({} with mint)", snapshot.len(), snapshot.resolved_count());
                }
            }
        }
        CacheAction::Clear => {
            cache.clear();
            println!("Cache cleared");
        }
    }
    Ok(())
}

//! Configuration Loader
//!
//! Loads and validates configuration from a TOML file. Every section is
//! optional; missing keys fall back to the defaults below.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::adapters::birdeye::{BirdeyeConfig, API_KEY_ENV};
use crate::adapters::coingecko::{CoinGeckoConfig, MAX_PER_PAGE};
use crate::adapters::rate_limit::RateLimiterConfig;
use crate::application::{RetryPolicy, SchedulerConfig, SearchLimits};

/// Main configuration structure matching config.toml
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub market_data: MarketDataSection,
    pub birdeye: BirdeyeSection,
    pub cache: CacheSection,
    pub scheduler: SchedulerSection,
    pub webhooks: WebhooksSection,
    pub logging: LoggingSection,
}

/// Market data (CoinGecko) section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MarketDataSection {
    /// API base URL
    pub api_url: String,
    /// Quote currency
    pub vs_currency: String,
    /// Category filter
    pub category: String,
    /// Tokens fetched per refresh cycle (1-250)
    pub token_count: usize,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for MarketDataSection {
    fn default() -> Self {
        let client = CoinGeckoConfig::default();
        Self {
            api_url: client.api_url,
            vs_currency: client.vs_currency,
            category: client.category,
            token_count: 100,
            timeout_secs: client.timeout_secs,
        }
    }
}

impl MarketDataSection {
    pub fn client_config(&self) -> CoinGeckoConfig {
        CoinGeckoConfig {
            api_url: self.api_url.clone(),
            vs_currency: self.vs_currency.clone(),
            category: self.category.clone(),
            timeout_secs: self.timeout_secs,
        }
    }
}

/// BirdEye section: credentials, rate limit and lookup page sizes
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BirdeyeSection {
    pub api_url: String,
    /// API key; `BIRDEYE_API_KEY` takes precedence when set
    pub api_key: Option<String>,
    /// Requests allowed per window
    pub max_requests: usize,
    /// Sliding window length in seconds
    pub window_secs: u64,
    /// Retries after a rate-limited response
    pub max_retries: u32,
    /// Backoff schedule for rate-limited retries
    pub retry_delays_secs: Vec<u64>,
    pub timeout_secs: u64,
    pub symbol_search_limit: usize,
    pub name_search_limit: usize,
    pub scan_limit: usize,
}

impl Default for BirdeyeSection {
    fn default() -> Self {
        let client = BirdeyeConfig::default();
        let limiter = RateLimiterConfig::default();
        let limits = SearchLimits::default();
        Self {
            api_url: client.api_url,
            api_key: None,
            max_requests: limiter.max_requests,
            window_secs: limiter.window_secs,
            max_retries: limiter.max_retries,
            retry_delays_secs: limiter.retry_delays_secs,
            timeout_secs: client.timeout_secs,
            symbol_search_limit: limits.symbol_search,
            name_search_limit: limits.name_search,
            scan_limit: limits.scan,
        }
    }
}

/// Pick the environment value when set and non-blank, the config value otherwise
pub fn resolve_api_key(config_value: Option<&str>, env_value: Option<&str>) -> Option<String> {
    env_value
        .or(config_value)
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
}

impl BirdeyeSection {
    /// Get API key with environment variable override
    pub fn get_api_key(&self) -> Option<String> {
        let env = std::env::var(API_KEY_ENV).ok().filter(|k| !k.trim().is_empty());
        resolve_api_key(self.api_key.as_deref(), env.as_deref())
    }

    pub fn client_config(&self) -> BirdeyeConfig {
        BirdeyeConfig {
            api_url: self.api_url.clone(),
            api_key: self.get_api_key(),
            timeout_secs: self.timeout_secs,
        }
    }

    pub fn rate_limiter_config(&self) -> RateLimiterConfig {
        RateLimiterConfig {
            max_requests: self.max_requests,
            window_secs: self.window_secs,
            max_retries: self.max_retries,
            retry_delays_secs: self.retry_delays_secs.clone(),
        }
    }

    pub fn search_limits(&self) -> SearchLimits {
        SearchLimits {
            symbol_search: self.symbol_search_limit,
            name_search: self.name_search_limit,
            scan: self.scan_limit,
        }
    }
}

/// Cache section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    /// Persisted cache file (`~` is expanded)
    pub file: String,
    /// Time-to-live in seconds
    pub ttl_secs: u64,
    /// Optional JSON export written after each successful refresh
    pub export_file: Option<String>,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            file: crate::adapters::storage::DEFAULT_CACHE_FILE.to_string(),
            ttl_secs: crate::application::DEFAULT_TTL_SECS,
            export_file: None,
        }
    }
}

fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}

impl CacheSection {
    pub fn path(&self) -> PathBuf {
        expand_path(&self.file)
    }

    pub fn export_path(&self) -> Option<PathBuf> {
        self.export_file
            .as_deref()
            .filter(|p| !p.is_empty())
            .map(expand_path)
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Scheduler section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerSection {
    /// Seconds between refresh cycles
    pub interval_secs: u64,
    /// Consecutive failed cycles before the cache is reset
    pub max_consecutive_failures: u32,
    /// Skip the first cycle when the restored cache is still fresh
    pub skip_initial_if_fresh: bool,
}

impl Default for SchedulerSection {
    fn default() -> Self {
        let defaults = SchedulerConfig::default();
        Self {
            interval_secs: defaults.interval.as_secs(),
            max_consecutive_failures: defaults.max_consecutive_failures,
            skip_initial_if_fresh: defaults.skip_initial_if_fresh,
        }
    }
}

/// Webhooks section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WebhooksSection {
    /// Attempts per subscriber, including the first
    pub max_attempts: u32,
    /// First retry delay in seconds; doubles per retry
    pub backoff_base_secs: u64,
    /// Delivery timeout in seconds
    pub timeout_secs: u64,
    /// Subscribers registered at start
    pub urls: Vec<String>,
}

impl Default for WebhooksSection {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            backoff_base_secs: policy.backoff_base.as_secs(),
            timeout_secs: 30,
            urls: Vec::new(),
        }
    }
}

impl WebhooksSection {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            backoff_base: Duration::from_secs(self.backoff_base_secs),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Logging configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level: "trace", "debug", "info", "warn", "error"
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Validation failed: {0}")]
    ValidationError(String),
}

/// Load configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

/// Load `path` when it exists, otherwise fall back to defaults
pub fn load_config_or_default<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    if path.exists() {
        return load_config(path);
    }

    tracing::warn!("Config file {} not found, using defaults", path.display());
    let config = Config::default();
    config.validate()?;
    Ok(config)
}

impl Config {
    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        let count = self.market_data.token_count;
        if count == 0 || count > MAX_PER_PAGE {
            return Err(ConfigError::ValidationError(format!(
                "token_count must be 1-{}, got {}",
                MAX_PER_PAGE, count
            )));
        }

        if self.market_data.api_url.is_empty() {
            return Err(ConfigError::ValidationError(
                "market_data.api_url cannot be empty".to_string(),
            ));
        }

        if self.birdeye.api_url.is_empty() {
            return Err(ConfigError::ValidationError(
                "birdeye.api_url cannot be empty".to_string(),
            ));
        }

        if self.birdeye.max_requests == 0 {
            return Err(ConfigError::ValidationError(
                "birdeye.max_requests must be > 0".to_string(),
            ));
        }

        if self.birdeye.window_secs == 0 {
            return Err(ConfigError::ValidationError(
                "birdeye.window_secs must be > 0".to_string(),
            ));
        }

        if self.birdeye.retry_delays_secs.is_empty() {
            return Err(ConfigError::ValidationError(
                "birdeye.retry_delays_secs cannot be empty".to_string(),
            ));
        }

        if self.scheduler.interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "scheduler.interval_secs must be > 0".to_string(),
            ));
        }

        if self.scheduler.max_consecutive_failures == 0 {
            return Err(ConfigError::ValidationError(
                "scheduler.max_consecutive_failures must be > 0".to_string(),
            ));
        }

        if self.webhooks.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "webhooks.max_attempts must be > 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            token_count: self.market_data.token_count,
            interval: Duration::from_secs(self.scheduler.interval_secs),
            max_consecutive_failures: self.scheduler.max_consecutive_failures,
            skip_initial_if_fresh: self.scheduler.skip_initial_if_fresh,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_valid_config() -> String {
        r#"
[market_data]
token_count = 50
timeout_secs = 10

[birdeye]
api_key = "from-config"
max_requests = 20
window_secs = 30
retry_delays_secs = [2, 4]

[cache]
file = "~/data/token_cache.json"
ttl_secs = 1800
export_file = "tokens_data.json"

[scheduler]
interval_secs = 120
max_consecutive_failures = 5

[webhooks]
max_attempts = 4
backoff_base_secs = 1
urls = ["https://hooks.example.com/tokens"]

[logging]
level = "debug"
"#
        .to_string()
    }

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_valid_config() {
        let file = write_config(&create_valid_config());
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.market_data.token_count, 50);
        assert_eq!(config.market_data.category, "solana-ecosystem");
        assert_eq!(config.birdeye.max_requests, 20);
        assert_eq!(config.birdeye.max_retries, 3);
        assert_eq!(config.birdeye.retry_delays_secs, vec![2, 4]);
        assert_eq!(config.cache.ttl(), Duration::from_secs(1800));
        assert_eq!(config.webhooks.urls.len(), 1);
        assert_eq!(config.logging.level, "debug");

        let scheduler = config.scheduler_config();
        assert_eq!(scheduler.token_count, 50);
        assert_eq!(scheduler.interval, Duration::from_secs(120));
        assert_eq!(scheduler.max_consecutive_failures, 5);
        assert!(scheduler.skip_initial_if_fresh);

        let policy = config.webhooks.retry_policy();
        assert_eq!(policy.max_attempts, 4);
        assert_eq!(policy.backoff(2), Duration::from_secs(2));
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let file = write_config("");
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.market_data.token_count, 100);
        assert_eq!(config.market_data.api_url, "https://api.coingecko.com/api/v3");
        assert_eq!(config.birdeye.api_url, "https://public-api.birdeye.so/defi");
        assert_eq!(config.birdeye.max_requests, 35);
        assert_eq!(config.birdeye.window_secs, 60);
        assert_eq!(config.birdeye.retry_delays_secs, vec![1, 5, 15]);
        assert_eq!(config.birdeye.scan_limit, 50);
        assert_eq!(config.cache.file, "token_cache.json");
        assert_eq!(config.cache.ttl_secs, 3600);
        assert_eq!(config.cache.export_path(), None);
        assert_eq!(config.scheduler.interval_secs, 300);
        assert_eq!(config.scheduler.max_consecutive_failures, 3);
        assert_eq!(config.webhooks.max_attempts, 3);
        assert_eq!(config.webhooks.backoff_base_secs, 2);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_missing_file() {
        let result = load_config("/nonexistent/path/config.toml");
        assert!(matches!(result.unwrap_err(), ConfigError::IoError(_)));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = load_config_or_default("/nonexistent/path/config.toml").unwrap();
        assert_eq!(config.market_data.token_count, 100);
    }

    #[test]
    fn test_malformed_toml() {
        let file = write_config("[market_data\ntoken_count = ");
        assert!(matches!(load_config(file.path()).unwrap_err(), ConfigError::ParseError(_)));
    }

    #[test]
    fn test_invalid_token_count() {
        for content in ["[market_data]\ntoken_count = 0", "[market_data]\ntoken_count = 251"] {
            let file = write_config(content);
            let err = load_config(file.path()).unwrap_err();
            assert!(matches!(err, ConfigError::ValidationError(_)));
            assert!(err.to_string().contains("token_count"));
        }
    }

    #[test]
    fn test_invalid_zero_values() {
        let cases = [
            ("[birdeye]\nwindow_secs = 0", "window_secs"),
            ("[birdeye]\nmax_requests = 0", "max_requests"),
            ("[birdeye]\nretry_delays_secs = []", "retry_delays_secs"),
            ("[scheduler]\ninterval_secs = 0", "interval_secs"),
            ("[scheduler]\nmax_consecutive_failures = 0", "max_consecutive_failures"),
            ("[webhooks]\nmax_attempts = 0", "max_attempts"),
            ("[birdeye]\napi_url = \"\"", "api_url"),
        ];

        for (content, field) in cases {
            let file = write_config(content);
            let err = load_config(file.path()).unwrap_err();
            assert!(err.to_string().contains(field), "expected {} in: {}", field, err);
        }
    }

    #[test]
    fn test_resolve_api_key() {
        assert_eq!(resolve_api_key(Some("cfg"), None), Some("cfg".to_string()));
        assert_eq!(resolve_api_key(Some("cfg"), Some("env")), Some("env".to_string()));
        assert_eq!(resolve_api_key(None, Some("  env  ")), Some("env".to_string()));
        assert_eq!(resolve_api_key(Some(""), None), None);
        assert_eq!(resolve_api_key(None, None), None);
    }

    #[test]
    fn test_tilde_expansion() {
        let section = CacheSection {
            file: "~/cache/tokens.json".to_string(),
            ..Default::default()
        };
        let path = section.path();
        assert!(!path.to_string_lossy().starts_with('~') || std::env::var("HOME").is_err());
        assert!(path.ends_with("cache/tokens.json"));
    }
}

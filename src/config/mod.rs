//! Configuration Module
//!
//! Loads and validates configuration from TOML files.

pub mod loader;

pub use loader::{
    load_config, load_config_or_default, resolve_api_key, BirdeyeSection, CacheSection, Config,
    ConfigError, LoggingSection, MarketDataSection, SchedulerSection, WebhooksSection,
};

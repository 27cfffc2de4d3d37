//! Token Cache
//!
//! Holds the last successfully resolved snapshot and its capture time.
//! Readers clone an `Arc` to the current snapshot; writers build a new
//! snapshot and swap the reference, so a reader never sees a partial update.
//!
//! Every write is persisted through a `CacheStore`. Persistence failures are
//! logged and never fail the write: the in-memory copy is authoritative for
//! the running process.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{now_unix, DatasetSnapshot, TokenRecord};
use crate::ports::{CacheStore, StoreError};

/// Default time-to-live (1 hour)
pub const DEFAULT_TTL_SECS: u64 = 3600;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Failed to serialize cache: {0}")]
    Serialization(String),

    #[error("Cache contents are corrupted: {0}")]
    Corrupted(String),
}

/// On-disk layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedCache {
    /// Capture time (Unix seconds)
    pub timestamp: i64,
    pub mint_mapping: BTreeMap<String, Option<String>>,
    pub tokens: Vec<TokenRecord>,
}

impl PersistedCache {
    pub fn from_snapshot(snapshot: &DatasetSnapshot) -> Self {
        Self {
            timestamp: snapshot.captured_at,
            mint_mapping: snapshot.mint_mapping(),
            tokens: snapshot.tokens.clone(),
        }
    }

    pub fn into_snapshot(self) -> DatasetSnapshot {
        DatasetSnapshot::new(self.timestamp, self.tokens)
    }
}

/// Human-facing export written after each successful refresh
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportReport {
    /// RFC 3339 capture time
    pub last_updated: String,
    pub total_tokens: usize,
    pub total_market_cap: f64,
    pub total_volume_24h: f64,
    pub tokens: Vec<TokenRecord>,
}

impl ExportReport {
    pub fn from_snapshot(snapshot: &DatasetSnapshot) -> Self {
        let totals = snapshot.totals();
        Self {
            last_updated: DateTime::<Utc>::from_timestamp(snapshot.captured_at, 0)
                .map(|t| t.to_rfc3339())
                .unwrap_or_default(),
            total_tokens: snapshot.len(),
            total_market_cap: totals.total_market_cap,
            total_volume_24h: totals.total_volume_24h,
            tokens: snapshot.tokens.clone(),
        }
    }
}

pub struct TokenCache {
    ttl: Duration,
    store: Arc<dyn CacheStore>,
    export: Option<Arc<dyn CacheStore>>,
    current: RwLock<Arc<DatasetSnapshot>>,
}

impl TokenCache {
    pub fn new(store: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        Self {
            ttl,
            store,
            export: None,
            current: RwLock::new(Arc::new(DatasetSnapshot::empty())),
        }
    }

    /// Also write an `ExportReport` after every successful `put`
    pub fn with_export(mut self, export: Arc<dyn CacheStore>) -> Self {
        self.export = Some(export);
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// TTL in whole seconds, saturating at `i64::MAX`
    fn ttl_secs(&self) -> i64 {
        i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX)
    }

    /// True while the current entry is younger than the TTL
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(now_unix())
    }

    pub fn is_valid_at(&self, now: i64) -> bool {
        let snapshot = self.get();
        snapshot.captured_at > 0 && snapshot.age_secs(now) < self.ttl_secs()
    }

    /// Current snapshot, whatever its age
    pub fn get(&self) -> Arc<DatasetSnapshot> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    fn swap(&self, snapshot: Arc<DatasetSnapshot>) {
        match self.current.write() {
            Ok(mut guard) => *guard = snapshot,
            Err(poisoned) => *poisoned.into_inner() = snapshot,
        }
    }

    /// Replace the in-memory entry, then persist it
    pub fn put(&self, snapshot: DatasetSnapshot) -> Arc<DatasetSnapshot> {
        let snapshot = Arc::new(snapshot);
        self.swap(Arc::clone(&snapshot));

        match self.persist(&snapshot) {
            Ok(()) => tracing::info!(
                tokens = snapshot.len(),
                resolved = snapshot.resolved_count(),
                "Cache updated"
            ),
            Err(e) => tracing::error!("Failed to persist cache: {}", e),
        }

        if let Some(export) = &self.export {
            if let Err(e) = write_export(export.as_ref(), &snapshot) {
                tracing::warn!("Failed to write snapshot export: {}", e);
            }
        }

        snapshot
    }

    /// Reset to an empty, zero-timestamp entry and drop the persisted copy
    pub fn clear(&self) {
        self.swap(Arc::new(DatasetSnapshot::empty()));

        match self.store.delete() {
            Ok(()) => tracing::info!("Cache cleared"),
            Err(e) => tracing::warn!("Cache cleared in memory, persisted copy not removed: {}", e),
        }
    }

    /// Restore the persisted entry when it is still within the TTL.
    /// Returns whether anything was restored.
    pub fn load(&self) -> bool {
        self.load_at(now_unix())
    }

    pub fn load_at(&self, now: i64) -> bool {
        let persisted = match self.read_persisted() {
            Ok(Some(persisted)) => persisted,
            Ok(None) => {
                tracing::info!("No persisted cache found, starting empty");
                return false;
            }
            Err(e) => {
                tracing::warn!("Ignoring unreadable cache: {}", e);
                return false;
            }
        };

        let age = persisted.age_secs(now);
        if persisted.captured_at <= 0 || age >= self.ttl_secs() {
            tracing::info!(age_secs = age, "Persisted cache expired, starting empty");
            return false;
        }

        tracing::info!(
            tokens = persisted.len(),
            age_secs = age,
            "Loaded cache from disk"
        );
        self.swap(Arc::new(persisted));
        true
    }

    /// Decode the persisted entry without touching the in-memory one
    pub fn read_persisted(&self) -> Result<Option<DatasetSnapshot>, CacheError> {
        let Some(bytes) = self.store.load()? else {
            return Ok(None);
        };

        let persisted: PersistedCache =
            serde_json::from_slice(&bytes).map_err(|e| CacheError::Corrupted(e.to_string()))?;
        Ok(Some(persisted.into_snapshot()))
    }

    fn persist(&self, snapshot: &DatasetSnapshot) -> Result<(), CacheError> {
        let bytes = serde_json::to_vec_pretty(&PersistedCache::from_snapshot(snapshot))
            .map_err(|e| CacheError::Serialization(e.to_string()))?;
        self.store.save(&bytes)?;
        Ok(())
    }
}

fn write_export(store: &dyn CacheStore, snapshot: &DatasetSnapshot) -> Result<(), CacheError> {
    let bytes = serde_json::to_vec_pretty(&ExportReport::from_snapshot(snapshot))
        .map_err(|e| CacheError::Serialization(e.to_string()))?;
    store.save(&bytes)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::token::fixtures::record;
    use crate::ports::mocks::MemoryStore;

    const TTL: Duration = Duration::from_secs(DEFAULT_TTL_SECS);

    fn snapshot_at(captured_at: i64) -> DatasetSnapshot {
        DatasetSnapshot::new(
            captured_at,
            vec![
                record(1, "SOL", Some("So11111111111111111111111111111111111111112"), 100.0, 10.0),
                record(2, "MYS", None, 50.0, 5.0),
            ],
        )
    }

    #[test]
    fn test_put_then_get_round_trip() {
        let store = Arc::new(MemoryStore::new());
        let cache = TokenCache::new(store.clone(), TTL);
        let snapshot = snapshot_at(now_unix());

        cache.put(snapshot.clone());

        assert_eq!(*cache.get(), snapshot);
        assert!(cache.is_valid());
        assert_eq!(store.save_count(), 1);
    }

    #[test]
    fn test_expires_after_ttl() {
        let cache = TokenCache::new(Arc::new(MemoryStore::new()), TTL);
        cache.put(snapshot_at(1_000_000));

        assert!(cache.is_valid_at(1_000_000 + 3599));
        assert!(!cache.is_valid_at(1_000_000 + 3600));
    }

    #[test]
    fn test_huge_ttl_never_expires() {
        let store = Arc::new(MemoryStore::new());
        let cache = TokenCache::new(store.clone(), Duration::from_secs(u64::MAX));
        cache.put(snapshot_at(1_000_000));

        assert!(cache.is_valid_at(1_000_000 + 10 * 365 * 86_400));

        let restarted = TokenCache::new(store, Duration::from_secs(u64::MAX));
        assert!(restarted.load_at(2_000_000));
    }

    #[test]
    fn test_empty_cache_is_invalid() {
        let cache = TokenCache::new(Arc::new(MemoryStore::new()), TTL);
        assert!(cache.get().is_empty());
        assert!(!cache.is_valid());
    }

    #[test]
    fn test_persist_failure_keeps_memory_copy() {
        let store = Arc::new(MemoryStore::failing());
        let cache = TokenCache::new(store.clone(), TTL);

        cache.put(snapshot_at(now_unix()));

        assert_eq!(cache.get().len(), 2);
        assert_eq!(store.save_count(), 1);
        assert_eq!(store.bytes(), None);
    }

    #[test]
    fn test_clear_resets_and_deletes() {
        let store = Arc::new(MemoryStore::new());
        let cache = TokenCache::new(store.clone(), TTL);
        cache.put(snapshot_at(now_unix()));

        cache.clear();

        assert!(cache.get().is_empty());
        assert_eq!(cache.get().captured_at, 0);
        assert!(!cache.is_valid());
        assert_eq!(store.delete_count(), 1);
        assert_eq!(store.bytes(), None);
    }

    #[test]
    fn test_persisted_layout() {
        let store = Arc::new(MemoryStore::new());
        let cache = TokenCache::new(store.clone(), TTL);
        cache.put(snapshot_at(1_700_000_000));

        let value: serde_json::Value = serde_json::from_slice(&store.bytes().unwrap()).unwrap();
        assert_eq!(value["timestamp"], 1_700_000_000);
        assert_eq!(
            value["mint_mapping"]["SOL"],
            "So11111111111111111111111111111111111111112"
        );
        assert!(value["mint_mapping"]["MYS"].is_null());
        assert_eq!(value["tokens"].as_array().unwrap().len(), 2);
        assert_eq!(value["tokens"][0]["rank"], 1);
        assert_eq!(value["tokens"][0]["solscan_url"], "https://solscan.io/token/So11111111111111111111111111111111111111112");
    }

    #[test]
    fn test_load_restores_fresh_entry() {
        let store = Arc::new(MemoryStore::new());
        TokenCache::new(store.clone(), TTL).put(snapshot_at(1_000_000));

        let restarted = TokenCache::new(store, TTL);
        assert!(restarted.load_at(1_000_000 + 60));
        assert_eq!(*restarted.get(), snapshot_at(1_000_000));
    }

    #[test]
    fn test_load_skips_expired_entry() {
        let store = Arc::new(MemoryStore::new());
        TokenCache::new(store.clone(), TTL).put(snapshot_at(1_000_000));

        let restarted = TokenCache::new(store, TTL);
        assert!(!restarted.load_at(1_000_000 + 7200));
        assert!(restarted.get().is_empty());
    }

    #[test]
    fn test_load_ignores_corrupted_store() {
        let store = Arc::new(MemoryStore::with_bytes(b"{ not json".to_vec()));
        let cache = TokenCache::new(store, TTL);

        assert!(!cache.load());
        assert!(matches!(cache.read_persisted(), Err(CacheError::Corrupted(_))));
    }

    #[test]
    fn test_export_report_written() {
        let export = Arc::new(MemoryStore::new());
        let cache = TokenCache::new(Arc::new(MemoryStore::new()), TTL).with_export(export.clone());

        cache.put(snapshot_at(1_700_000_000));

        let report: ExportReport = serde_json::from_slice(&export.bytes().unwrap()).unwrap();
        assert_eq!(report.total_tokens, 2);
        assert_eq!(report.total_market_cap, 150.0);
        assert_eq!(report.total_volume_24h, 15.0);
        assert_eq!(report.last_updated, "2023-11-14T22:13:20+00:00");
    }
}

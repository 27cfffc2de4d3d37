//! In-memory port implementations that record calls and return scripted
//! responses. Used by unit and integration tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::market_data::{MarketDataSource, MarketEntry};
use super::store::{CacheStore, StoreError};
use super::token_provider::{ListedToken, ProviderError, TokenProvider};
use super::webhook::{DeliveryError, WebhookTransport};
use crate::domain::HolderBalance;

/// Mock market data source returning queued responses, then a fallback
#[derive(Debug, Default)]
pub struct MockMarketData {
    queued: Mutex<VecDeque<Vec<MarketEntry>>>,
    fallback: Mutex<Vec<MarketEntry>>,
    calls: Mutex<Vec<usize>>,
}

impl MockMarketData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always return these entries (after any queued responses)
    pub fn with_entries(self, entries: Vec<MarketEntry>) -> Self {
        *self.fallback.lock().unwrap() = entries;
        self
    }

    /// Queue a one-shot response
    pub fn push_response(&self, entries: Vec<MarketEntry>) {
        self.queued.lock().unwrap().push_back(entries);
    }

    /// Requested counts, in call order
    pub fn get_calls(&self) -> Vec<usize> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl MarketDataSource for MockMarketData {
    async fn fetch_top_tokens(&self, count: usize) -> Vec<MarketEntry> {
        self.calls.lock().unwrap().push(count);
        let entries = self
            .queued
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.lock().unwrap().clone());
        entries.into_iter().take(count).collect()
    }
}

/// Mock token provider keyed by search keyword (`None` = unfiltered list)
#[derive(Debug, Default)]
pub struct MockTokenProvider {
    credentials: bool,
    searches: Mutex<HashMap<Option<String>, Result<Vec<ListedToken>, ProviderError>>>,
    holders: Mutex<HashMap<String, Vec<HolderBalance>>>,
    search_calls: Mutex<Vec<(Option<String>, usize)>>,
    holder_calls: Mutex<Vec<(String, usize)>>,
}

impl MockTokenProvider {
    /// Provider with a configured credential
    pub fn new() -> Self {
        Self {
            credentials: true,
            ..Default::default()
        }
    }

    /// Provider with no credential configured
    pub fn without_credentials() -> Self {
        Self::default()
    }

    pub fn with_search(self, keyword: Option<&str>, tokens: Vec<ListedToken>) -> Self {
        self.searches
            .lock()
            .unwrap()
            .insert(keyword.map(str::to_string), Ok(tokens));
        self
    }

    pub fn with_search_error(self, keyword: Option<&str>, error: ProviderError) -> Self {
        self.searches
            .lock()
            .unwrap()
            .insert(keyword.map(str::to_string), Err(error));
        self
    }

    pub fn with_holders(self, mint: &str, holders: Vec<HolderBalance>) -> Self {
        self.holders.lock().unwrap().insert(mint.to_string(), holders);
        self
    }

    pub fn search_calls(&self) -> Vec<(Option<String>, usize)> {
        self.search_calls.lock().unwrap().clone()
    }

    pub fn holder_calls(&self) -> Vec<(String, usize)> {
        self.holder_calls.lock().unwrap().clone()
    }

    /// Total number of simulated network calls
    pub fn call_count(&self) -> usize {
        self.search_calls.lock().unwrap().len() + self.holder_calls.lock().unwrap().len()
    }
}

#[async_trait]
impl TokenProvider for MockTokenProvider {
    fn has_credentials(&self) -> bool {
        self.credentials
    }

    async fn search_tokens(
        &self,
        keyword: Option<&str>,
        limit: usize,
    ) -> Result<Vec<ListedToken>, ProviderError> {
        let key = keyword.map(str::to_string);
        self.search_calls.lock().unwrap().push((key.clone(), limit));
        match self.searches.lock().unwrap().get(&key) {
            Some(Ok(tokens)) => Ok(tokens.iter().take(limit).cloned().collect()),
            Some(Err(e)) => Err(e.clone()),
            None => Ok(Vec::new()),
        }
    }

    async fn token_holders(
        &self,
        mint: &str,
        limit: usize,
    ) -> Result<Vec<HolderBalance>, ProviderError> {
        self.holder_calls.lock().unwrap().push((mint.to_string(), limit));
        Ok(self
            .holders
            .lock()
            .unwrap()
            .get(mint)
            .map(|h| h.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}

/// In-memory cache store with call counters
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: Mutex<Option<Vec<u8>>>,
    fail_writes: bool,
    saves: AtomicUsize,
    deletes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store whose saves always fail
    pub fn failing() -> Self {
        Self {
            fail_writes: true,
            ..Default::default()
        }
    }

    /// Store pre-seeded with bytes
    pub fn with_bytes(bytes: Vec<u8>) -> Self {
        Self {
            data: Mutex::new(Some(bytes)),
            ..Default::default()
        }
    }

    pub fn bytes(&self) -> Option<Vec<u8>> {
        self.data.lock().unwrap().clone()
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn delete_count(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }
}

impl CacheStore for MemoryStore {
    fn load(&self) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.data.lock().unwrap().clone())
    }

    fn save(&self, bytes: &[u8]) -> Result<(), StoreError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes {
            return Err(StoreError::WriteError("disk full".into()));
        }
        *self.data.lock().unwrap() = Some(bytes.to_vec());
        Ok(())
    }

    fn delete(&self) -> Result<(), StoreError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        *self.data.lock().unwrap() = None;
        Ok(())
    }
}

/// Mock webhook transport: per-URL scripted result, default HTTP 200
#[derive(Debug, Default, Clone)]
pub struct MockTransport {
    results: Arc<Mutex<HashMap<String, Result<u16, DeliveryError>>>>,
    attempts: Arc<Mutex<HashMap<String, u32>>>,
    bodies: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(self, url: &str, status: u16) -> Self {
        self.results.lock().unwrap().insert(url.to_string(), Ok(status));
        self
    }

    pub fn with_error(self, url: &str, error: DeliveryError) -> Self {
        self.results.lock().unwrap().insert(url.to_string(), Err(error));
        self
    }

    /// Number of delivery attempts made to `url`
    pub fn attempts(&self, url: &str) -> u32 {
        self.attempts.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    /// Every body posted, in order
    pub fn bodies(&self) -> Vec<Vec<u8>> {
        self.bodies.lock().unwrap().clone()
    }
}

#[async_trait]
impl WebhookTransport for MockTransport {
    async fn post_json(&self, url: &str, body: &[u8]) -> Result<u16, DeliveryError> {
        *self.attempts.lock().unwrap().entry(url.to_string()).or_insert(0) += 1;
        self.bodies.lock().unwrap().push(body.to_vec());
        self.results
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .unwrap_or(Ok(200))
    }
}

//! Storage Adapter
//!
//! File-backed `CacheStore` for the token cache.

mod file_store;

pub use file_store::{FileStore, DEFAULT_CACHE_FILE};

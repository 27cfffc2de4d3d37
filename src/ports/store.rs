//! Durable Store Port
//!
//! Byte-oriented persistence for the token cache (file, key-value store, ...).

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Failed to read from store: {0}")]
    ReadError(String),

    #[error("Failed to write to store: {0}")]
    WriteError(String),

    #[error("Failed to delete from store: {0}")]
    DeleteError(String),
}

pub trait CacheStore: Send + Sync {
    /// Stored bytes, or `None` when nothing was saved
    fn load(&self) -> Result<Option<Vec<u8>>, StoreError>;

    fn save(&self, bytes: &[u8]) -> Result<(), StoreError>;

    /// Remove the stored copy. Deleting a missing entry is not an error.
    fn delete(&self) -> Result<(), StoreError>;
}

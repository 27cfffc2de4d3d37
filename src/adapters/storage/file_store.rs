//! File Store
//!
//! Keeps the cache as a single file on disk. The parent directory is created
//! on first write; a missing file loads as "nothing saved".

use std::fs;
use std::path::{Path, PathBuf};

use crate::ports::{CacheStore, StoreError};

/// Default cache file name
pub const DEFAULT_CACHE_FILE: &str = "token_cache.json";

#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }
}

impl CacheStore for FileStore {
    fn load(&self) -> Result<Option<Vec<u8>>, StoreError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let bytes = fs::read(&self.path).map_err(|e| StoreError::ReadError(e.to_string()))?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }

        Ok(Some(bytes))
    }

    fn save(&self, bytes: &[u8]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StoreError::WriteError(e.to_string()))?;
        }

        fs::write(&self.path, bytes).map_err(|e| StoreError::WriteError(e.to_string()))?;
        tracing::debug!("Cache written to {} ({} bytes)", self.path.display(), bytes.len());
        Ok(())
    }

    fn delete(&self) -> Result<(), StoreError> {
        if self.path.exists() {
            fs::remove_file(&self.path).map_err(|e| StoreError::DeleteError(e.to_string()))?;
            tracing::info!("Cache file deleted: {}", self.path.display());
        }
        Ok(())
    }
}

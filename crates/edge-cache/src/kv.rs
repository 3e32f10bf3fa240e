//! Key-value stores backing the generation counter and persisted entries.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::{CacheError, CacheResult};

/// A durable key-value store holding small byte values.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Get a value. Returns `None` if the key doesn't exist.
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>>;

    /// Set a value, replacing any previous one.
    async fn put(&self, key: &str, value: &[u8]) -> CacheResult<()>;

    /// Remove a value. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> CacheResult<()>;
}

/// In-process key-value store for local runs and tests.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryKvStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let entries = self
            .entries
            .read()
            .map_err(|e| CacheError::StoreRead(e.to_string()))?;
        Ok(entries.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &[u8]) -> CacheResult<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| CacheError::StoreWrite(e.to_string()))?;
        entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| CacheError::StoreWrite(e.to_string()))?;
        entries.remove(key);
        Ok(())
    }
}

/// Key-value store backed by Spin's Key-Value Store.
///
/// Holds the store name and opens a handle per call, so no host handle is
/// kept across an `.await`.
#[cfg(target_arch = "wasm32")]
#[derive(Debug, Clone)]
pub struct SpinKvStore {
    name: String,
}

#[cfg(target_arch = "wasm32")]
impl SpinKvStore {
    /// Open a named Key-Value store, failing early if the component has no
    /// access to it.
    pub fn open(name: &str) -> CacheResult<Self> {
        spin_sdk::key_value::Store::open(name)
            .map_err(|e| CacheError::StoreRead(format!("{}: {}", name, e)))?;
        Ok(Self {
            name: name.to_string(),
        })
    }

    fn handle(&self) -> CacheResult<spin_sdk::key_value::Store> {
        spin_sdk::key_value::Store::open(&self.name)
            .map_err(|e| CacheError::StoreRead(format!("{}: {}", self.name, e)))
    }
}

#[cfg(target_arch = "wasm32")]
#[async_trait]
impl KvStore for SpinKvStore {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        self.handle()?
            .get(key)
            .map_err(|e| CacheError::StoreRead(e.to_string()))
    }

    async fn put(&self, key: &str, value: &[u8]) -> CacheResult<()> {
        self.handle()?
            .set(key, value)
            .map_err(|e| CacheError::StoreWrite(e.to_string()))
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.handle()?
            .delete(key)
            .map_err(|e| CacheError::StoreWrite(e.to_string()))
    }
}

//! Edge response store with freshness-header hiding.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use edge_core::{EdgeResponse, HeaderSet};
use http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::error::{CacheError, CacheResult};
use crate::headers::{hide_cache_headers, restore_cache_headers};
use crate::key::CacheKey;
use crate::kv::KvStore;
use crate::version::Generation;

/// Default `max-age` on stored envelopes (ten years).
pub const DEFAULT_STORED_MAX_AGE: u64 = 315_360_000;

/// The raw platform cache primitive: keyed response storage.
///
/// Entries are stored exactly as given; header hiding happens in
/// [`EdgeCacheStore`].
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Find the entry stored under `key`.
    async fn match_key(&self, key: &CacheKey) -> CacheResult<Option<EdgeResponse>>;

    /// Store `response` under `key`, replacing any previous entry.
    async fn put(&self, key: &CacheKey, response: EdgeResponse) -> CacheResult<()>;

    /// Drop every entry written under a generation older than `generation`.
    ///
    /// Returns the number of entries removed. Entries stored without a
    /// generation are left alone.
    async fn evict_before(&self, generation: u64) -> CacheResult<usize>;
}

/// In-process response cache for local runs and tests.
#[derive(Debug, Default)]
pub struct MemoryCacheBackend {
    entries: RwLock<HashMap<String, (Option<u64>, EdgeResponse)>>,
}

impl MemoryCacheBackend {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stored keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .entries
            .read()
            .map(|e| e.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }
}

#[async_trait]
impl CacheBackend for MemoryCacheBackend {
    async fn match_key(&self, key: &CacheKey) -> CacheResult<Option<EdgeResponse>> {
        let entries = self
            .entries
            .read()
            .map_err(|e| CacheError::StoreRead(e.to_string()))?;
        Ok(entries.get(key.as_str()).map(|(_, response)| response.clone()))
    }

    async fn put(&self, key: &CacheKey, response: EdgeResponse) -> CacheResult<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| CacheError::StoreWrite(e.to_string()))?;
        entries.insert(key.as_str().to_string(), (key.generation(), response));
        Ok(())
    }

    async fn evict_before(&self, generation: u64) -> CacheResult<usize> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| CacheError::StoreWrite(e.to_string()))?;
        let before = entries.len();
        entries.retain(|_, (stored, _)| stored.map_or(true, |g| g >= generation));
        Ok(before - entries.len())
    }
}

/// Serialized form of a stored response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedEntry {
    /// Status code.
    pub status: u16,
    /// Headers in storage order.
    pub headers: Vec<(String, String)>,
    /// Response body.
    pub body: Vec<u8>,
}

impl From<&EdgeResponse> for CachedEntry {
    fn from(response: &EdgeResponse) -> Self {
        Self {
            status: response.status.as_u16(),
            headers: response.headers.to_pairs(),
            body: response.body.clone(),
        }
    }
}

impl TryFrom<CachedEntry> for EdgeResponse {
    type Error = CacheError;

    fn try_from(entry: CachedEntry) -> Result<Self, Self::Error> {
        let status = StatusCode::from_u16(entry.status)
            .map_err(|e| CacheError::StoreRead(format!("stored status {}: {}", entry.status, e)))?;
        let headers = HeaderSet::from_pairs(entry.headers)
            .map_err(|e| CacheError::StoreRead(e.to_string()))?;
        Ok(EdgeResponse {
            status,
            headers,
            body: entry.body,
        })
    }
}

/// Response cache persisted as JSON in a key-value store.
///
/// Key-value stores never expire entries, so the backend keeps an index of
/// the keys written in each generation and [`evict_before`] deletes whole
/// generations once a purge has made them unreachable. Layout under the
/// prefix:
///
/// - `<prefix><key>`: one serialized [`CachedEntry`]
/// - `<prefix>#index:<n>`: JSON list of the entry keys written in generation `n`
/// - `<prefix>#generations`: JSON list of generations that have an index
///
/// Cache keys never contain `#` (fragments are stripped), so the index keys
/// cannot collide with entries. Index updates are read-modify-write; a
/// racing writer can drop an index line, leaving that one entry behind.
///
/// [`evict_before`]: CacheBackend::evict_before
pub struct KvCacheBackend {
    kv: Arc<dyn KvStore>,
    prefix: String,
}

impl KvCacheBackend {
    /// Create a backend storing entries under `prefix` + key.
    pub fn new(kv: Arc<dyn KvStore>, prefix: impl Into<String>) -> Self {
        Self {
            kv,
            prefix: prefix.into(),
        }
    }

    fn storage_key(&self, key: &CacheKey) -> String {
        format!("{}{}", self.prefix, key.as_str())
    }

    fn index_key(&self, generation: u64) -> String {
        format!("{}#index:{}", self.prefix, generation)
    }

    fn generations_key(&self) -> String {
        format!("{}#generations", self.prefix)
    }

    async fn read_list<T: serde::de::DeserializeOwned>(&self, key: &str) -> CacheResult<Vec<T>> {
        match self.kv.get(key).await? {
            Some(raw) => Ok(serde_json::from_slice(&raw)?),
            None => Ok(Vec::new()),
        }
    }

    async fn write_list<T: Serialize>(&self, key: &str, items: &[T]) -> CacheResult<()> {
        self.kv.put(key, &serde_json::to_vec(items)?).await
    }

    async fn index(&self, generation: u64, storage_key: String) -> CacheResult<()> {
        let generations_key = self.generations_key();
        let mut generations: Vec<u64> = self.read_list(&generations_key).await?;
        if !generations.contains(&generation) {
            generations.push(generation);
            self.write_list(&generations_key, &generations).await?;
        }

        let index_key = self.index_key(generation);
        let mut keys: Vec<String> = self.read_list(&index_key).await?;
        if !keys.contains(&storage_key) {
            keys.push(storage_key);
            self.write_list(&index_key, &keys).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl CacheBackend for KvCacheBackend {
    async fn match_key(&self, key: &CacheKey) -> CacheResult<Option<EdgeResponse>> {
        let Some(raw) = self.kv.get(&self.storage_key(key)).await? else {
            return Ok(None);
        };
        let entry: CachedEntry = serde_json::from_slice(&raw)?;
        EdgeResponse::try_from(entry).map(Some)
    }

    async fn put(&self, key: &CacheKey, response: EdgeResponse) -> CacheResult<()> {
        let raw = serde_json::to_vec(&CachedEntry::from(&response))?;
        let storage_key = self.storage_key(key);
        // Index first so no entry is ever written without a way to evict it.
        if let Some(generation) = key.generation() {
            self.index(generation, storage_key.clone()).await?;
        }
        self.kv.put(&storage_key, &raw).await
    }

    async fn evict_before(&self, generation: u64) -> CacheResult<usize> {
        let generations_key = self.generations_key();
        let generations: Vec<u64> = self.read_list(&generations_key).await?;
        let (stale, live): (Vec<u64>, Vec<u64>) =
            generations.into_iter().partition(|g| *g < generation);
        if stale.is_empty() {
            return Ok(0);
        }

        let mut removed = 0;
        for old in &stale {
            let index_key = self.index_key(*old);
            let keys: Vec<String> = self.read_list(&index_key).await?;
            for key in &keys {
                self.kv.delete(key).await?;
            }
            removed += keys.len();
            self.kv.delete(&index_key).await?;
        }

        self.write_list(&generations_key, &live).await?;
        Ok(removed)
    }
}

/// Edge store that keeps freshness semantics away from other caches.
///
/// Stored entries carry their original `Cache-Control`, `Expires` and
/// `Pragma` under shadow names and never carry `Set-Cookie`.
#[derive(Clone)]
pub struct EdgeCacheStore {
    backend: Arc<dyn CacheBackend>,
    stored_max_age: u64,
}

impl EdgeCacheStore {
    /// Create a store over `backend`.
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self {
            backend,
            stored_max_age: DEFAULT_STORED_MAX_AGE,
        }
    }

    /// Set the envelope `max-age`.
    pub fn with_stored_max_age(mut self, max_age: u64) -> Self {
        self.stored_max_age = max_age;
        self
    }

    /// Find the entry for `key` with its original headers restored.
    pub async fn lookup(&self, key: &CacheKey) -> CacheResult<Option<EdgeResponse>> {
        let Some(stored) = self.backend.match_key(key).await? else {
            return Ok(None);
        };
        let headers = restore_cache_headers(stored.headers.clone());
        Ok(Some(stored.with_headers(headers)))
    }

    /// Build the envelope that [`store`](Self::store) writes.
    pub fn prepare(&self, response: &EdgeResponse) -> EdgeResponse {
        let headers = hide_cache_headers(response.headers.clone(), self.stored_max_age);
        response.clone().with_headers(headers)
    }

    /// Write `response` under `key`.
    pub async fn store(&self, key: &CacheKey, response: &EdgeResponse) -> CacheResult<()> {
        self.backend.put(key, self.prepare(response)).await
    }

    /// Delete entries from generations older than `current`.
    ///
    /// Does nothing when versioning is disabled.
    pub async fn evict_before(&self, current: Generation) -> CacheResult<usize> {
        match current {
            Generation::Versioned(n) => self.backend.evict_before(n).await,
            Generation::Disabled => Ok(0),
        }
    }
}

impl std::fmt::Debug for EdgeCacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EdgeCacheStore")
            .field("stored_max_age", &self.stored_max_age)
            .finish()
    }
}

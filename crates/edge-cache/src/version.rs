//! Cache generation counter.
//!
//! Every stored entry lives under a key that embeds the generation it was
//! written in. Bumping the generation makes every older key unreachable at
//! once, which is how a purge works without touching the cache itself.

use std::sync::Arc;

use crate::error::{CacheError, CacheResult};
use crate::kv::KvStore;

/// The cache epoch a request reads and writes under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Generation {
    /// Versioning is active; entries are keyed by this counter value.
    Versioned(u64),
    /// No generation store is configured.
    Disabled,
}

impl Generation {
    /// Value for the `x-HTML-Edge-Cache-Version` header, if one should be sent.
    pub fn header_value(&self) -> Option<String> {
        match self {
            Self::Versioned(n) => Some(n.to_string()),
            Self::Disabled => None,
        }
    }

    /// The counter value, if versioning is active.
    pub fn value(&self) -> Option<u64> {
        match self {
            Self::Versioned(n) => Some(*n),
            Self::Disabled => None,
        }
    }
}

impl std::fmt::Display for Generation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Versioned(n) => write!(f, "{}", n),
            Self::Disabled => write!(f, "disabled"),
        }
    }
}

/// Reads and advances the durable generation counter.
#[derive(Clone)]
pub struct VersionStore {
    kv: Option<Arc<dyn KvStore>>,
    key: String,
}

impl VersionStore {
    /// Create a store backed by `kv` under `key`.
    pub fn new(kv: Arc<dyn KvStore>, key: impl Into<String>) -> Self {
        Self {
            kv: Some(kv),
            key: key.into(),
        }
    }

    /// Create a store with versioning disabled.
    pub fn disabled() -> Self {
        Self {
            kv: None,
            key: String::new(),
        }
    }

    /// Whether a durable counter is configured.
    pub fn is_enabled(&self) -> bool {
        self.kv.is_some()
    }

    /// Read the current generation.
    ///
    /// A missing or unreadable counter counts as 0; when the key is absent
    /// the 0 is written back on a best-effort basis. Never fails.
    pub async fn current(&self) -> Generation {
        let Some(kv) = &self.kv else {
            return Generation::Disabled;
        };

        match self.read(kv.as_ref()).await {
            Ok(Some(n)) => Generation::Versioned(n),
            Ok(None) => {
                if let Err(e) = kv.put(&self.key, b"0").await {
                    tracing::debug!(
                        key = %self.key,
                        error = %e,
                        "failed to initialise cache generation"
                    );
                }
                Generation::Versioned(0)
            }
            Err(e) => {
                tracing::warn!(
                    key = %self.key,
                    error = %e,
                    "cache generation read failed, using 0"
                );
                Generation::Versioned(0)
            }
        }
    }

    /// Advance the generation past both the stored value and `seen`.
    ///
    /// `seen` is the generation the purging request was served under; the
    /// new value is `max(stored, seen) + 1`. Returns the new generation, or
    /// `None` when versioning is disabled and the caller has to purge some
    /// other way. A failed read aborts the bump without writing, so the
    /// counter never goes backwards. Concurrent bumps may land on the same
    /// value or skip one.
    pub async fn bump(&self, seen: Generation) -> CacheResult<Option<Generation>> {
        let Some(kv) = &self.kv else {
            return Ok(None);
        };

        let stored = self
            .read(kv.as_ref())
            .await
            .map_err(|e| CacheError::GenerationStore(e.to_string()))?
            .unwrap_or(0);
        let next = stored.max(seen.value().unwrap_or(0)).saturating_add(1);
        kv.put(&self.key, next.to_string().as_bytes())
            .await
            .map_err(|e| CacheError::GenerationStore(e.to_string()))?;

        Ok(Some(Generation::Versioned(next)))
    }

    async fn read(&self, kv: &dyn KvStore) -> CacheResult<Option<u64>> {
        let Some(raw) = kv.get(&self.key).await? else {
            return Ok(None);
        };
        let text = String::from_utf8_lossy(&raw);
        text.trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|e| {
                CacheError::GenerationStore(format!("unparseable generation {:?}: {}", text, e))
            })
    }
}

impl std::fmt::Debug for VersionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionStore")
            .field("enabled", &self.is_enabled())
            .field("key", &self.key)
            .finish()
    }
}

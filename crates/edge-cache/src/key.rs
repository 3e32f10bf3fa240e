//! Cache key composition.

use serde::{Deserialize, Serialize};

use crate::version::Generation;

/// Query parameter carrying the generation in storage keys.
pub const VERSION_PARAM: &str = "cf_edge_cache_ver";

/// A storage lookup key for one URL in one generation.
///
/// Only ever used to address the edge store; it is never sent to the
/// client or the origin and never parsed back.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    key: String,
    generation: Option<u64>,
}

impl CacheKey {
    /// Get the key string.
    pub fn as_str(&self) -> &str {
        &self.key
    }

    /// The generation this key was built for, if versioning is active.
    pub fn generation(&self) -> Option<u64> {
        self.generation
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key)
    }
}

/// Maps a request URL and generation to a [`CacheKey`].
pub struct CacheKeyCodec;

impl CacheKeyCodec {
    /// Build the key for `url` under `generation`.
    ///
    /// The fragment is dropped and an empty trailing `?` is ignored; the
    /// generation is appended as `cf_edge_cache_ver=<n>`. With versioning
    /// disabled the normalized URL itself is the key.
    pub fn encode(url: &str, generation: Generation) -> CacheKey {
        let url = normalize(url);

        let Generation::Versioned(version) = generation else {
            return CacheKey {
                key: url.to_string(),
                generation: None,
            };
        };

        let separator = if url.contains('?') { '&' } else { '?' };
        CacheKey {
            key: format!("{}{}{}={}", url, separator, VERSION_PARAM, version),
            generation: Some(version),
        }
    }
}

fn normalize(url: &str) -> &str {
    let without_fragment = url.split('#').next().unwrap_or_default();
    without_fragment.strip_suffix('?').unwrap_or(without_fragment)
}

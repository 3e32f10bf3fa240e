//! Versioned HTML edge cache with origin-directed invalidation.
//!
//! This crate provides:
//! - `VersionStore` - Durable cache generation counter
//! - `CacheKeyCodec` - Generation-scoped storage keys
//! - `DirectiveParser` - Origin control header decoding
//! - `BypassPolicy` - Cookie rules that keep personalised clients off the shared cache
//! - `EdgeCacheStore` - Response storage with freshness headers hidden behind shadow names
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use edge_cache::{
//!     CacheKeyCodec, EdgeCacheStore, MemoryCacheBackend, MemoryKvStore, VersionStore,
//! };
//!
//! let versions = VersionStore::new(Arc::new(MemoryKvStore::new()), "html_cache_version");
//! let store = EdgeCacheStore::new(Arc::new(MemoryCacheBackend::new()));
//!
//! let generation = versions.current().await;
//! let key = CacheKeyCodec::encode("/index.html", generation);
//! let cached = store.lookup(&key).await?;
//! ```

mod directive;
mod error;
mod headers;
mod key;
mod kv;
mod policy;
mod store;
mod version;

pub use directive::*;
pub use error::*;
pub use headers::*;
pub use key::*;
pub use kv::*;
pub use policy::*;
pub use store::*;
pub use version::*;

//! Public SDK for the versioned HTML edge cache.
//!
//! This crate re-exports all cache functionality:
//!
//! ```ignore
//! use edge_sdk::prelude::*;
//!
//! let config = EdgeCacheConfig::load("edge-cache.toml")?;
//! let coordinator = RequestCoordinator::builder(config, origin)
//!     .with_generation_store(kv)
//!     .build()?;
//!
//! let response = coordinator.handle(request).await?;
//! ```

pub use edge_cache;
pub use edge_core;
pub use edge_data;
pub use edge_executor;
pub use edge_observability;

/// Prelude for convenient imports.
pub mod prelude {
    pub use edge_cache::*;
    pub use edge_core::*;
    pub use edge_data::*;
    pub use edge_executor::*;
    pub use edge_observability::*;
}

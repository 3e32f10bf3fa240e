//! Core abstractions for the HTML edge cache.
//!
//! This crate provides the fundamental types shared by every layer:
//! - `HeaderSet` - Immutable, copy-on-write header collection
//! - `EdgeRequest` / `EdgeResponse` - Owned HTTP messages passed between components
//! - `RequestId` - Per-request correlation identifier
//! - `LifecyclePhase` - Request lifecycle states
//! - `EdgeCacheConfig` - Process-wide immutable configuration

mod config;
mod context;
mod headers;
mod lifecycle;
mod response;

pub use config::*;
pub use context::*;
pub use headers::*;
pub use lifecycle::*;
pub use response::*;

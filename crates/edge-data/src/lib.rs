//! Outbound HTTP for the edge cache.
//!
//! This crate provides:
//! - `OriginFetch` - The origin fetch collaborator interface
//! - `TimeoutFetch` - Total-time limit around any fetcher
//! - `ZonePurgeClient` - Platform-wide purge used when no generation store exists
//! - `SpinOriginFetch` - Outbound HTTP through the Spin host (wasm32 only)

mod client;
mod purge;
#[cfg(target_arch = "wasm32")]
mod spin;
#[cfg(not(target_arch = "wasm32"))]
mod timeout;

pub use client::*;
pub use purge::*;
#[cfg(target_arch = "wasm32")]
pub use spin::*;
#[cfg(not(target_arch = "wasm32"))]
pub use timeout::*;

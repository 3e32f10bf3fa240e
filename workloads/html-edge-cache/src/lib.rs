//! Spin component serving HTML through the versioned edge cache.
//!
//! Every request goes through a `RequestCoordinator` backed by the
//! component's key-value store. Detached cache writes, purges and refreshes
//! run after the response body has been written.

#[cfg(target_arch = "wasm32")]
mod component;
pub mod convert;

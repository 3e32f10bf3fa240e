//! Request coordination for the HTML edge cache.
//!
//! This crate provides:
//! - `RequestCoordinator` - Lookup, origin fetch, directive handling and store for each request
//! - `Spawner` - Detached task execution (`TokioSpawner`, `DeferredSpawner`)
//! - `StatusTrace` - The accumulated `x-HTML-Edge-Cache-Status` value

mod coordinator;
mod detached;
mod error;
mod status;

pub use coordinator::*;
pub use detached::*;
pub use error::*;
pub use status::*;

//! Observability infrastructure for the HTML edge cache.
//!
//! This crate provides:
//! - `StructuredLogger` - Structured logging with request context
//! - `CacheMetrics` - Process-wide cache outcome counters

mod logging;
mod metrics;

pub use logging::*;
pub use metrics::*;

// Re-export RequestId from edge-core for convenience
pub use edge_core::RequestId;

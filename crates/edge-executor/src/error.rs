//! Coordinator error type.

use edge_data::FetchError;

/// Errors surfaced to the caller of the coordinator.
///
/// Cache and generation store failures never appear here; they are
/// absorbed and at most noted in the status trace.
#[derive(Debug, thiserror::Error)]
pub enum EdgeError {
    /// The origin produced no response, so there is nothing to serve.
    #[error("upstream fetch failed: {0}")]
    Upstream(#[from] FetchError),

    /// The coordinator could not be built from its configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

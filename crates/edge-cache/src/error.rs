//! Cache error types.

use thiserror::Error;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors raised by the cache and generation stores.
///
/// None of these ever reach a client: callers degrade to "absent" or
/// "not cached" and at most record the message in the status trace.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Reading from the backing store failed.
    #[error("store read failed: {0}")]
    StoreRead(String),

    /// Writing to the backing store failed.
    #[error("store write failed: {0}")]
    StoreWrite(String),

    /// The generation counter could not be read or advanced.
    #[error("generation store failed: {0}")]
    GenerationStore(String),

    /// A stored entry could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

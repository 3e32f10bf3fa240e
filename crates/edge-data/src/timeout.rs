//! Timeout wrapper for fetch operations.

use std::time::Duration;

use async_trait::async_trait;
use edge_core::{EdgeRequest, EdgeResponse};

use crate::client::{FetchError, OriginFetch};

/// Default total time allowed for one origin fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Fails a fetch that takes longer than a fixed total time.
pub struct TimeoutFetch<F> {
    inner: F,
    total: Duration,
}

impl<F> TimeoutFetch<F> {
    /// Wrap `inner` with the default timeout.
    pub fn new(inner: F) -> Self {
        Self {
            inner,
            total: DEFAULT_FETCH_TIMEOUT,
        }
    }

    /// Set the total timeout.
    pub fn with_timeout(mut self, total: Duration) -> Self {
        self.total = total;
        self
    }
}

#[async_trait]
impl<F: OriginFetch> OriginFetch for TimeoutFetch<F> {
    async fn fetch(&self, request: EdgeRequest) -> Result<EdgeResponse, FetchError> {
        let url = request.url.clone();
        match tokio::time::timeout(self.total, self.inner.fetch(request)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(format!(
                "{} after {:?}",
                url, self.total
            ))),
        }
    }
}

//! Origin fetch collaborator.

use std::sync::Arc;

use async_trait::async_trait;
use edge_core::{EdgeRequest, EdgeResponse};

/// Error type for fetch operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP error: {status} for {url}")]
    Http { status: u16, url: String },

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Request error: {0}")]
    Request(String),
}

/// Sends a request to the origin (or any upstream) and returns its response.
///
/// Non-2xx responses are ordinary responses, not errors; only a failure to
/// obtain a response at all is a [`FetchError`].
#[async_trait]
pub trait OriginFetch: Send + Sync {
    /// Perform the request.
    async fn fetch(&self, request: EdgeRequest) -> Result<EdgeResponse, FetchError>;
}

#[async_trait]
impl<T: OriginFetch + ?Sized> OriginFetch for Arc<T> {
    async fn fetch(&self, request: EdgeRequest) -> Result<EdgeResponse, FetchError> {
        (**self).fetch(request).await
    }
}

/// Adapts an async closure into an [`OriginFetch`].
pub struct FnFetch<F> {
    f: F,
}

impl<F> FnFetch<F> {
    /// Wrap a closure.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> OriginFetch for FnFetch<F>
where
    F: Fn(EdgeRequest) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<EdgeResponse, FetchError>> + Send,
{
    async fn fetch(&self, request: EdgeRequest) -> Result<EdgeResponse, FetchError> {
        (self.f)(request).await
    }
}

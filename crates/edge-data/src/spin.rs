//! Outbound HTTP through the Spin host.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use edge_core::{EdgeRequest, EdgeResponse, HeaderSet};
use http::StatusCode;

use crate::client::{FetchError, OriginFetch};

/// Sends requests with `spin_sdk::http::send`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SpinOriginFetch;

#[async_trait]
impl OriginFetch for SpinOriginFetch {
    async fn fetch(&self, request: EdgeRequest) -> Result<EdgeResponse, FetchError> {
        SingleThreaded(Box::pin(send(request))).await
    }
}

async fn send(request: EdgeRequest) -> Result<EdgeResponse, FetchError> {
    let url = request.url.clone();

    let mut builder = spin_sdk::http::Request::builder();
    builder.method(spin_method(&request.method)).uri(&request.url);
    for (name, value) in request.headers.to_pairs() {
        builder.header(name, value);
    }
    let outgoing = builder.body(request.body).build();

    let response: spin_sdk::http::Response = spin_sdk::http::send(outgoing)
        .await
        .map_err(|e| FetchError::Connection(format!("{}: {}", url, e)))?;

    let status = StatusCode::from_u16(*response.status())
        .map_err(|e| FetchError::Upstream(format!("{}: {}", url, e)))?;
    let headers = HeaderSet::from_pairs(response.headers().map(|(name, value)| {
        (name.to_string(), String::from_utf8_lossy(value.as_bytes()).into_owned())
    }))
    .map_err(|e| FetchError::Upstream(e.to_string()))?;

    Ok(EdgeResponse {
        status,
        headers,
        body: response.into_body(),
    })
}

fn spin_method(method: &http::Method) -> spin_sdk::http::Method {
    use spin_sdk::http::Method;

    match method.as_str() {
        "GET" => Method::Get,
        "HEAD" => Method::Head,
        "POST" => Method::Post,
        "PUT" => Method::Put,
        "DELETE" => Method::Delete,
        "PATCH" => Method::Patch,
        "OPTIONS" => Method::Options,
        other => Method::Other(other.to_string()),
    }
}

// The host's send future is not `Send`, while `OriginFetch` futures must be.
struct SingleThreaded<F>(Pin<Box<F>>);

// SAFETY: wasm32 Spin components run on one thread, so the future is never
// polled or dropped from another thread.
unsafe impl<F> Send for SingleThreaded<F> {}

impl<F: Future> Future for SingleThreaded<F> {
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.get_mut().0.as_mut().poll(cx)
    }
}

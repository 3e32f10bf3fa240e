//! The response type passed between origin, cache and client.

use http::StatusCode;

use crate::headers::HeaderSet;

/// An owned HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeResponse {
    /// Status code.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderSet,
    /// Response body.
    pub body: Vec<u8>,
}

impl EdgeResponse {
    /// Create an empty response with the given status.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderSet::new(),
            body: Vec::new(),
        }
    }

    /// Create a 200 response carrying an HTML body.
    pub fn html(body: impl Into<Vec<u8>>) -> Self {
        Self::new(StatusCode::OK)
            .with_header("Content-Type", "text/html; charset=utf-8")
            .with_body(body)
    }

    /// Set a header, replacing earlier values.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers = self.headers.with(name, value);
        self
    }

    /// Replace the whole header set.
    pub fn with_headers(mut self, headers: HeaderSet) -> Self {
        self.headers = headers;
        self
    }

    /// Replace the body.
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Get a header value by name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Whether the status is exactly 200.
    pub fn is_ok(&self) -> bool {
        self.status == StatusCode::OK
    }
}

//! Request identity and the inbound request type.

use std::sync::atomic::{AtomicU32, Ordering};

use http::Method;

use crate::headers::HeaderSet;

/// Unique request identifier for log correlation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(pub String);

static SEQUENCE: AtomicU32 = AtomicU32::new(0);

impl RequestId {
    /// Generate a new request ID.
    pub fn generate() -> Self {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed);
        Self(format!("{:x}-{:x}", nanos, seq))
    }

    /// Create from an existing ID string.
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An owned HTTP request as seen at the edge.
///
/// `url` is whatever the client asked for: an absolute URL or a
/// path with optional query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeRequest {
    /// HTTP method.
    pub method: Method,
    /// Request target.
    pub url: String,
    /// Request headers.
    pub headers: HeaderSet,
    /// Request body.
    pub body: Vec<u8>,
}

impl EdgeRequest {
    /// Create a request with no headers or body.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderSet::new(),
            body: Vec::new(),
        }
    }

    /// Create a GET request.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    /// Set a header, replacing earlier values.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers = self.headers.with(name, value);
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

    /// The path component, without scheme, authority, query or fragment.
    pub fn path(&self) -> &str {
        let target = self.url.split(['?', '#']).next().unwrap_or_default();
        match target.find("://") {
            Some(scheme_end) => {
                let rest = &target[scheme_end + 3..];
                rest.find('/').map(|i| &rest[i..]).unwrap_or("/")
            }
            None => target,
        }
    }

    /// Whether the `Accept` header asks for HTML.
    pub fn accepts_html(&self) -> bool {
        self.headers
            .joined("Accept", ", ")
            .map(|accept| accept.contains("text/html"))
            .unwrap_or(false)
    }

    /// Whether the client forced a reload with `Cache-Control: no-cache`.
    pub fn is_no_cache(&self) -> bool {
        self.headers
            .joined("Cache-Control", ", ")
            .map(|cc| cc.contains("no-cache"))
            .unwrap_or(false)
    }

    /// Every `Cookie` field joined into one `; `-separated list.
    ///
    /// HTTP/2 clients may send each cookie as its own field.
    pub fn cookie_header(&self) -> Option<String> {
        self.headers.joined("Cookie", "; ")
    }

    /// Whether this is a GET request.
    pub fn is_get(&self) -> bool {
        self.method == Method::GET
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_id_unique() {
        let a = RequestId::generate();
        let b = RequestId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_path_from_relative_url() {
        let req = EdgeRequest::get("/blog/post?page=2#top");
        assert_eq!(req.path(), "/blog/post");
    }

    #[test]
    fn test_path_from_absolute_url() {
        assert_eq!(EdgeRequest::get("https://shop.example/sw.js?v=1").path(), "/sw.js");
        assert_eq!(EdgeRequest::get("https://shop.example").path(), "/");
    }

    #[test]
    fn test_accepts_html() {
        let req = EdgeRequest::get("/").with_header("Accept", "text/html,application/xhtml+xml");
        assert!(req.accepts_html());
        assert!(!EdgeRequest::get("/").with_header("Accept", "image/webp").accepts_html());
        assert!(!EdgeRequest::get("/").accepts_html());
    }

    #[test]
    fn test_no_cache_detection() {
        let req = EdgeRequest::get("/").with_header("cache-control", "max-age=0, no-cache");
        assert!(req.is_no_cache());
        assert!(!EdgeRequest::get("/").is_no_cache());
    }

    #[test]
    fn test_cookie_header() {
        let req = EdgeRequest::get("/").with_header("Cookie", "a=1; b=2");
        assert_eq!(req.cookie_header().as_deref(), Some("a=1; b=2"));
        assert_eq!(EdgeRequest::get("/").cookie_header(), None);
    }

    #[test]
    fn test_cookie_header_joins_split_fields() {
        let mut req = EdgeRequest::get("/");
        req.headers = req
            .headers
            .appended("Cookie", "theme=dark")
            .appended("Cookie", "_ga=GA1.1");
        assert_eq!(req.cookie_header().as_deref(), Some("theme=dark; _ga=GA1.1"));
    }

    #[test]
    fn test_cookie_header_keeps_non_ascii_values() {
        let req = EdgeRequest::get("/").with_header("Cookie", "sessionid=alice; city=Kraków");
        assert_eq!(req.cookie_header().as_deref(), Some("sessionid=alice; city=Kraków"));
    }
}

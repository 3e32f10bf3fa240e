//! Conversions between Spin's HTTP types and the cache's owned messages.

use edge_sdk::edge_core::{EdgeRequest, HeaderSet, InvalidHeader};
use spin_sdk::http::Method as SpinMethod;

/// Headers the host manages itself and refuses on outgoing responses.
const HOP_BY_HOP: [&str; 6] = [
    "connection",
    "keep-alive",
    "proxy-connection",
    "transfer-encoding",
    "upgrade",
    "host",
];

/// Map a Spin method onto `http::Method`.
pub fn edge_method(method: &SpinMethod) -> Result<http::Method, http::method::InvalidMethod> {
    Ok(match method {
        SpinMethod::Get => http::Method::GET,
        SpinMethod::Head => http::Method::HEAD,
        SpinMethod::Post => http::Method::POST,
        SpinMethod::Put => http::Method::PUT,
        SpinMethod::Delete => http::Method::DELETE,
        SpinMethod::Patch => http::Method::PATCH,
        SpinMethod::Options => http::Method::OPTIONS,
        SpinMethod::Connect => http::Method::CONNECT,
        SpinMethod::Trace => http::Method::TRACE,
        SpinMethod::Other(name) => http::Method::from_bytes(name.as_bytes())?,
    })
}

/// Join the origin base URL with the inbound request target.
pub fn origin_url(origin_base: &str, path_with_query: &str) -> String {
    let base = origin_base.trim_end_matches('/');
    if path_with_query.starts_with('/') {
        format!("{}{}", base, path_with_query)
    } else {
        format!("{}/{}", base, path_with_query)
    }
}

/// Build the request forwarded through the cache.
///
/// The inbound `Host` is dropped so the origin sees its own authority.
pub fn edge_request(
    method: http::Method,
    url: String,
    headers: Vec<(String, Vec<u8>)>,
    body: Vec<u8>,
) -> Result<EdgeRequest, InvalidHeader> {
    let headers = HeaderSet::from_pairs(
        headers
            .into_iter()
            .map(|(name, value)| (name, String::from_utf8_lossy(&value).into_owned())),
    )?
    .without("host");

    Ok(EdgeRequest {
        method,
        url,
        headers,
        body,
    })
}

/// Response headers in the shape `Fields::from_list` takes.
pub fn header_list(headers: &HeaderSet) -> Vec<(String, Vec<u8>)> {
    headers
        .to_pairs()
        .into_iter()
        .filter(|(name, _)| !HOP_BY_HOP.iter().any(|h| name.eq_ignore_ascii_case(h)))
        .map(|(name, value)| (name, value.into_bytes()))
        .collect()
}

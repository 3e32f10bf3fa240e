//! Shadow storage headers and client-facing cache status headers.

use edge_core::HeaderSet;

use crate::version::Generation;

/// Header names used by the edge cache.
pub mod header_names {
    /// Accumulated status trace sent to the client.
    pub const X_EDGE_CACHE_STATUS: &str = "x-HTML-Edge-Cache-Status";
    /// Generation the response was resolved under.
    pub const X_EDGE_CACHE_VERSION: &str = "x-HTML-Edge-Cache-Version";
    /// Platform-style hit marker.
    pub const CF_CACHE_STATUS: &str = "CF-Cache-Status";
    /// Prefix of the shadow copies of freshness headers.
    pub const SHADOW_PREFIX: &str = "x-HTML-Edge-Cache-Header-";
    /// Standard response cookie header.
    pub const SET_COOKIE: &str = "Set-Cookie";
    /// Standard freshness header overwritten on stored envelopes.
    pub const CACHE_CONTROL: &str = "Cache-Control";
}

/// Freshness headers hidden from intermediate caches while stored.
pub const CACHE_HEADERS: [&str; 3] = ["Cache-Control", "Expires", "Pragma"];

/// Shadow name for a hidden header, e.g. `x-HTML-Edge-Cache-Header-Expires`.
pub fn shadow_name(header: &str) -> String {
    format!("{}{}", header_names::SHADOW_PREFIX, header)
}

/// Prepare headers for storage.
///
/// Freshness headers move to their shadow names, `Set-Cookie` is dropped
/// and the envelope gets a long public `Cache-Control`; freshness is
/// governed by the generation in the key, not by this TTL.
pub fn hide_cache_headers(headers: HeaderSet, stored_max_age: u64) -> HeaderSet {
    let hidden = CACHE_HEADERS
        .iter()
        .fold(headers, |h, name| h.with_renamed(name, &shadow_name(name)));

    hidden
        .without(header_names::SET_COOKIE)
        .with(
            header_names::CACHE_CONTROL,
            &format!("public; max-age={}", stored_max_age),
        )
}

/// Undo [`hide_cache_headers`] on a stored entry.
///
/// The envelope `Cache-Control` and any leaked status header are removed
/// before the shadows are moved back.
pub fn restore_cache_headers(headers: HeaderSet) -> HeaderSet {
    let cleaned = headers
        .without(header_names::CACHE_CONTROL)
        .without(header_names::X_EDGE_CACHE_STATUS);

    CACHE_HEADERS
        .iter()
        .fold(cleaned, |h, name| h.with_renamed(&shadow_name(name), name))
}

/// Observability headers attached to responses sent to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheExplainHeaders {
    /// Status trace, e.g. `Miss, Cached`.
    pub status: String,
    /// Generation used, when versioning is active.
    pub generation: Option<Generation>,
    /// Whether the body came from the edge store.
    pub served_from_cache: bool,
}

impl CacheExplainHeaders {
    /// Create explain headers carrying a status trace.
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            generation: None,
            served_from_cache: false,
        }
    }

    /// Set the generation.
    pub fn with_generation(mut self, generation: Generation) -> Self {
        self.generation = Some(generation);
        self
    }

    /// Mark the response as served from the edge store.
    pub fn mark_hit(mut self) -> Self {
        self.served_from_cache = true;
        self
    }

    /// Convert to header pairs.
    pub fn to_headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = vec![(header_names::X_EDGE_CACHE_STATUS, self.status.clone())];

        if let Some(version) = self.generation.and_then(|g| g.header_value()) {
            headers.push((header_names::X_EDGE_CACHE_VERSION, version));
        }

        if self.served_from_cache {
            headers.push((header_names::CF_CACHE_STATUS, "HIT".to_string()));
        }

        headers
    }

    /// Apply to a header set.
    pub fn apply(&self, headers: HeaderSet) -> HeaderSet {
        self.to_headers()
            .into_iter()
            .fold(headers, |h, (name, value)| h.with(name, &value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin_headers() -> HeaderSet {
        HeaderSet::new()
            .with("Content-Type", "text/html")
            .with("Cache-Control", "max-age=60, must-revalidate")
            .with("Expires", "Thu, 01 Dec 1994 16:00:00 GMT")
            .appended("Set-Cookie", "sessionid=abc")
            .appended("Set-Cookie", "theme=dark")
    }

    #[test]
    fn test_shadow_name() {
        assert_eq!(shadow_name("Pragma"), "x-HTML-Edge-Cache-Header-Pragma");
    }

    #[test]
    fn test_hide_relocates_and_strips() {
        let hidden = hide_cache_headers(origin_headers(), 315_360_000);

        assert_eq!(hidden.get("Cache-Control"), Some("public; max-age=315360000"));
        assert_eq!(
            hidden.get("x-HTML-Edge-Cache-Header-Cache-Control"),
            Some("max-age=60, must-revalidate")
        );
        assert_eq!(
            hidden.get("x-html-edge-cache-header-expires"),
            Some("Thu, 01 Dec 1994 16:00:00 GMT")
        );
        assert!(!hidden.contains("Expires"));
        assert!(!hidden.contains("Set-Cookie"));
        assert!(!hidden.contains("x-HTML-Edge-Cache-Header-Pragma"));
    }

    #[test]
    fn test_restore_is_lossless() {
        let original = origin_headers().without("Set-Cookie");
        let restored = restore_cache_headers(hide_cache_headers(original.clone(), 10));

        assert_eq!(restored.get("Cache-Control"), original.get("Cache-Control"));
        assert_eq!(restored.get("Expires"), original.get("Expires"));
        assert!(!restored.contains("x-HTML-Edge-Cache-Header-Cache-Control"));
        assert!(!restored.contains("Pragma"));
    }

    #[test]
    fn test_restore_drops_envelope_and_status() {
        let stored = HeaderSet::new()
            .with("Cache-Control", "public; max-age=1")
            .with("x-HTML-Edge-Cache-Status", "Miss, Cached");
        let restored = restore_cache_headers(stored);

        assert!(!restored.contains("Cache-Control"));
        assert!(!restored.contains("x-HTML-Edge-Cache-Status"));
    }

    #[test]
    fn test_explain_headers_hit() {
        let headers = CacheExplainHeaders::new("Hit")
            .with_generation(Generation::Versioned(3))
            .mark_hit()
            .apply(HeaderSet::new());

        assert_eq!(headers.get("x-HTML-Edge-Cache-Status"), Some("Hit"));
        assert_eq!(headers.get("x-HTML-Edge-Cache-Version"), Some("3"));
        assert_eq!(headers.get("CF-Cache-Status"), Some("HIT"));
    }

    #[test]
    fn test_explain_headers_disabled_generation() {
        let pairs = CacheExplainHeaders::new("Miss")
            .with_generation(Generation::Disabled)
            .to_headers();

        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0], (header_names::X_EDGE_CACHE_STATUS, "Miss".to_string()));
    }
}

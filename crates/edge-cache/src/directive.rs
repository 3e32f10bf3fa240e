//! Origin control header parsing.
//!
//! The origin steers the edge through one response header:
//!
//! ```text
//! x-HTML-Edge-Cache: purgeall, cache, bypass-cookies=sessionid|/^cart_.*$/
//! ```

use edge_core::HeaderSet;

use crate::policy::BypassRule;

/// Header carrying directives (origin to edge) and capabilities (edge to origin).
pub const DIRECTIVE_HEADER: &str = "x-HTML-Edge-Cache";

/// Capability value sent to the origin on every protocol-aware fetch.
pub const CAPABILITY_VALUE: &str = "supports=cache|purgeall|bypass-cookies";

const TOKEN_PURGE_ALL: &str = "purgeall";
const TOKEN_CACHE: &str = "cache";
const TOKEN_BYPASS_COOKIES: &str = "bypass-cookies";

/// Instructions parsed from one origin response.
///
/// The presence of a value (as opposed to `None` from the parser) means the
/// origin expressed a preference: without the `cache` token it is an
/// explicit "do not cache".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OriginDirectives {
    /// Invalidate the whole cache.
    pub purge: bool,
    /// Store this response.
    pub cache: bool,
    /// Bypass rules replacing the defaults; empty means use the defaults.
    pub bypass_cookies: Vec<BypassRule>,
}

/// Decodes the control header.
pub struct DirectiveParser;

impl DirectiveParser {
    /// Parse a raw header value.
    ///
    /// Returns `None` when the header is absent or blank. Token names are
    /// case-insensitive, whitespace around tokens and rules is ignored and
    /// unknown tokens are skipped.
    pub fn parse(header: Option<&str>) -> Option<OriginDirectives> {
        let header = header.filter(|h| !h.trim().is_empty())?;
        let mut directives = OriginDirectives::default();

        for token in header.split(',').map(str::trim) {
            let (name, argument) = match token.split_once('=') {
                Some((name, argument)) => (name.trim(), Some(argument)),
                None => (token, None),
            };

            if name.eq_ignore_ascii_case(TOKEN_PURGE_ALL) {
                directives.purge = true;
            } else if name.eq_ignore_ascii_case(TOKEN_CACHE) {
                directives.cache = true;
            } else if name.eq_ignore_ascii_case(TOKEN_BYPASS_COOKIES) {
                let Some(rules) = argument else {
                    continue;
                };
                directives.bypass_cookies.extend(
                    rules
                        .split('|')
                        .map(str::trim)
                        .filter(|r| !r.is_empty())
                        .map(BypassRule::parse),
                );
            } else if !name.is_empty() {
                tracing::trace!(token, "ignoring unknown edge cache directive");
            }
        }

        Some(directives)
    }

    /// Parse the control header out of a response's headers.
    pub fn from_headers(headers: &HeaderSet) -> Option<OriginDirectives> {
        Self::parse(headers.get(DIRECTIVE_HEADER))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_header() {
        assert_eq!(DirectiveParser::parse(None), None);
        assert_eq!(DirectiveParser::parse(Some("  ")), None);
    }

    #[test]
    fn test_purge_and_cache() {
        let d = DirectiveParser::parse(Some("purgeall,cache")).unwrap();
        assert!(d.purge);
        assert!(d.cache);
        assert!(d.bypass_cookies.is_empty());
    }

    #[test]
    fn test_case_and_whitespace_insensitive() {
        let d = DirectiveParser::parse(Some("  PurgeAll ,  CACHE ")).unwrap();
        assert!(d.purge && d.cache);
    }

    #[test]
    fn test_bypass_cookie_rules() {
        let d = DirectiveParser::parse(Some("cache, bypass-cookies= sessionid | /^cart_.*$/ ||"))
            .unwrap();
        assert_eq!(d.bypass_cookies.len(), 2);
        assert_eq!(d.bypass_cookies[0], BypassRule::literal("sessionid"));
        assert!(matches!(d.bypass_cookies[1], BypassRule::Pattern(_)));
    }

    #[test]
    fn test_bypass_only_suppresses_caching() {
        let d = DirectiveParser::parse(Some("bypass-cookies=foo")).unwrap();
        assert!(!d.cache);
        assert!(!d.purge);
    }

    #[test]
    fn test_unknown_tokens_still_non_null() {
        let d = DirectiveParser::parse(Some("stale-while-revalidate, nonsense=1")).unwrap();
        assert_eq!(d, OriginDirectives::default());
    }

    #[test]
    fn test_bypass_cookies_without_rules() {
        let d = DirectiveParser::parse(Some("bypass-cookies")).unwrap();
        assert!(d.bypass_cookies.is_empty());
    }

    #[test]
    fn test_from_headers() {
        let headers = HeaderSet::new().with("X-Html-Edge-Cache", "cache");
        assert!(DirectiveParser::from_headers(&headers).unwrap().cache);
        assert_eq!(DirectiveParser::from_headers(&HeaderSet::new()), None);
    }
}

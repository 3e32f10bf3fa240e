//! Cookie-based cache bypass rules.
//!
//! A shared cache entry is not client specific, so any client holding a
//! session, cart or similar cookie must skip it. The rule set is checked
//! both before storing a fresh response and before serving a stored one.

use regex::Regex;

use crate::directive::OriginDirectives;

/// Cookies that mark a client as carrying personal state.
const DEFAULT_BYPASS_COOKIES: &[&str] = &[
    "pushowl_visitor_token",
    "react-use-cart",
    "/^@@auth0spajs@@.*$/",
    "/^ecommerce_checkout_return_url_.*$/",
    "/^_ga.*$/",
    "_uetsid",
    "SESS_7",
    "_clsk",
    "_gcl_au",
    "po_visitor",
];

/// A single test against one `name=value` cookie entry.
#[derive(Debug, Clone)]
pub enum BypassRule {
    /// Matches cookies starting with this text.
    Literal(String),
    /// Matches cookies containing a match for this pattern.
    Pattern(Regex),
}

impl BypassRule {
    /// Create a literal prefix rule.
    pub fn literal(prefix: impl Into<String>) -> Self {
        Self::Literal(prefix.into())
    }

    /// Create a pattern rule.
    pub fn pattern(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(Self::Pattern)
    }

    /// Parse a rule as written in headers and config.
    ///
    /// `/.../` is a pattern; anything else, including a pattern that does
    /// not compile, is a literal prefix.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if let Some(body) = raw
            .strip_prefix('/')
            .and_then(|r| r.strip_suffix('/'))
            .filter(|b| !b.is_empty())
        {
            match Regex::new(body) {
                Ok(re) => return Self::Pattern(re),
                Err(e) => {
                    tracing::debug!(
                        rule = raw,
                        error = %e,
                        "bypass pattern did not compile, using it as a prefix"
                    );
                }
            }
        }
        Self::Literal(raw.to_string())
    }

    /// Test a trimmed `name=value` cookie entry.
    pub fn matches(&self, cookie: &str) -> bool {
        match self {
            Self::Literal(prefix) => cookie.starts_with(prefix.as_str()),
            Self::Pattern(re) => re.is_match(cookie),
        }
    }

    /// The rule in its written form.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Literal(prefix) => prefix,
            Self::Pattern(re) => re.as_str(),
        }
    }
}

impl PartialEq for BypassRule {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Literal(a), Self::Literal(b)) => a == b,
            (Self::Pattern(a), Self::Pattern(b)) => a.as_str() == b.as_str(),
            _ => false,
        }
    }
}

impl Eq for BypassRule {}

/// Decides whether a client must skip the shared cache.
#[derive(Debug, Clone)]
pub struct BypassPolicy {
    default_rules: Vec<BypassRule>,
}

impl Default for BypassPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_BYPASS_COOKIES.iter().map(|r| BypassRule::parse(r)).collect())
    }
}

impl BypassPolicy {
    /// Create a policy with the given default rules.
    pub fn new(default_rules: Vec<BypassRule>) -> Self {
        Self { default_rules }
    }

    /// Create a policy from written rules, or the built-in list when `None`.
    pub fn from_config(rules: Option<&[String]>) -> Self {
        match rules {
            Some(rules) => Self::new(rules.iter().map(|r| BypassRule::parse(r)).collect()),
            None => Self::default(),
        }
    }

    /// The rules used when the origin names none.
    pub fn default_rules(&self) -> &[BypassRule] {
        &self.default_rules
    }

    /// The rules in force for a response with these directives.
    ///
    /// An origin-supplied list replaces the defaults entirely.
    pub fn rules_for<'a>(&'a self, directives: Option<&'a OriginDirectives>) -> &'a [BypassRule] {
        match directives {
            Some(d) if !d.bypass_cookies.is_empty() => &d.bypass_cookies,
            _ => &self.default_rules,
        }
    }

    /// Whether a client with this `Cookie` header must bypass the cache
    /// for a response carrying these directives.
    pub fn evaluate(
        &self,
        cookie_header: Option<&str>,
        directives: Option<&OriginDirectives>,
    ) -> bool {
        should_bypass(cookie_header, self.rules_for(directives))
    }
}

/// Check each `;`-separated cookie against each rule; first match wins.
pub fn should_bypass(cookie_header: Option<&str>, rules: &[BypassRule]) -> bool {
    let Some(header) = cookie_header.filter(|h| !h.is_empty()) else {
        return false;
    };
    if rules.is_empty() {
        return false;
    }

    header
        .split(';')
        .map(str::trim)
        .any(|cookie| rules.iter().any(|rule| rule.matches(cookie)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_literal_and_pattern() {
        assert_eq!(BypassRule::parse(" sessionid "), BypassRule::literal("sessionid"));
        assert!(matches!(BypassRule::parse("/^_ga.*$/"), BypassRule::Pattern(_)));
    }

    #[test]
    fn test_parse_broken_pattern_is_literal() {
        assert_eq!(BypassRule::parse("/([/"), BypassRule::literal("/([/"));
        assert_eq!(BypassRule::parse("//"), BypassRule::literal("//"));
    }

    #[test]
    fn test_literal_matches_prefix_only() {
        let rule = BypassRule::literal("SESS_7");
        assert!(rule.matches("SESS_7abc=1"));
        assert!(!rule.matches("x_SESS_7=1"));
    }

    #[test]
    fn test_pattern_matches_anywhere() {
        let rule = BypassRule::pattern("cart").unwrap();
        assert!(rule.matches("my_cart_id=4"));
    }

    #[test]
    fn test_should_bypass_trims_cookies() {
        let rules = vec![BypassRule::literal("sessionid")];
        assert!(should_bypass(Some("theme=dark;   sessionid=abc"), &rules));
        assert!(!should_bypass(Some("theme=dark"), &rules));
    }

    #[test]
    fn test_should_bypass_empty_inputs() {
        let rules = vec![BypassRule::literal("a")];
        assert!(!should_bypass(None, &rules));
        assert!(!should_bypass(Some(""), &rules));
        assert!(!should_bypass(Some("a=1"), &[]));
    }

    #[test]
    fn test_default_rules_cover_analytics() {
        let policy = BypassPolicy::default();
        assert_eq!(policy.default_rules().len(), 10);
        assert!(policy.evaluate(Some("_ga_XYZ=GS1.1"), None));
        assert!(policy.evaluate(Some("@@auth0spajs@@::client=1"), None));
        assert!(policy.evaluate(Some("po_visitor=9"), None));
        assert!(!policy.evaluate(Some("lang=en"), None));
    }

    #[test]
    fn test_directive_rules_replace_defaults() {
        let policy = BypassPolicy::default();
        let directives = OriginDirectives {
            bypass_cookies: vec![BypassRule::literal("sessionid")],
            ..Default::default()
        };

        assert!(policy.evaluate(Some("sessionid=abc"), Some(&directives)));
        assert!(!policy.evaluate(Some("_ga=1"), Some(&directives)));
    }

    #[test]
    fn test_directives_without_rules_use_defaults() {
        let policy = BypassPolicy::default();
        let directives = OriginDirectives {
            cache: true,
            ..Default::default()
        };
        assert!(policy.evaluate(Some("_ga=1"), Some(&directives)));
    }

    #[test]
    fn test_from_config_overrides_defaults() {
        let rules = vec!["wp_".to_string()];
        let policy = BypassPolicy::from_config(Some(&rules));
        assert!(policy.evaluate(Some("wp_user=1"), None));
        assert!(!policy.evaluate(Some("_ga=1"), None));
    }
}

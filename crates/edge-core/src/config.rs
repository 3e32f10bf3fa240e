//! Process-wide edge cache configuration.
//!
//! Built once at start-up and shared read-only (behind an `Arc`) by every
//! component; nothing reads credentials or toggles from ambient state.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// Configuration for the HTML edge cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeCacheConfig {
    /// Name of the key-value store holding the cache generation.
    ///
    /// `None` disables generation-based invalidation.
    #[serde(default)]
    pub kv_store: Option<String>,

    /// Key under which the generation counter is stored.
    #[serde(default = "default_version_key")]
    pub version_key: String,

    /// Credentials for the platform purge API, used when no generation
    /// store is configured.
    #[serde(default)]
    pub purge_api: Option<PurgeApiConfig>,

    /// Replacement for the built-in bypass cookie rules.
    ///
    /// Entries written as `/.../` are patterns, anything else is a
    /// cookie-name prefix.
    #[serde(default)]
    pub default_bypass_cookies: Option<Vec<String>>,

    /// Path patterns that are always fetched straight from origin.
    #[serde(default = "default_pass_through_paths")]
    pub pass_through_paths: Vec<String>,

    /// `max-age` placed on stored envelopes.
    #[serde(default = "default_stored_max_age")]
    pub stored_max_age: u64,

    /// Total time allowed for one origin fetch, in milliseconds.
    ///
    /// Applied on native targets; a Spin host enforces its own limits.
    #[serde(default)]
    pub origin_timeout_ms: Option<u64>,
}

impl Default for EdgeCacheConfig {
    fn default() -> Self {
        Self {
            kv_store: None,
            version_key: default_version_key(),
            purge_api: None,
            default_bypass_cookies: None,
            pass_through_paths: default_pass_through_paths(),
            stored_max_age: default_stored_max_age(),
            origin_timeout_ms: None,
        }
    }
}

impl EdgeCacheConfig {
    /// Load config from a file (JSON when the name ends in `.json`, TOML otherwise).
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config: Self = if path.ends_with(".json") {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", path))?
        } else {
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse TOML config: {}", path))?
        };

        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a TOML document, e.g. one bundled into a component.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Failed to parse TOML config")?;
        config.validate()?;
        Ok(config)
    }

    /// Check that patterns compile and credentials are usable.
    pub fn validate(&self) -> Result<()> {
        if self.version_key.trim().is_empty() {
            bail!("version_key must not be empty");
        }

        for pattern in &self.pass_through_paths {
            regex::Regex::new(pattern)
                .with_context(|| format!("Invalid pass-through pattern: {}", pattern))?;
        }

        if self.origin_timeout_ms == Some(0) {
            bail!("origin_timeout_ms must be greater than zero");
        }

        if let Some(api) = &self.purge_api {
            if !api.is_complete() {
                bail!("purge_api requires email, key and zone");
            }
        }

        Ok(())
    }

    /// Whether purge API credentials are fully present.
    pub fn has_purge_api(&self) -> bool {
        self.purge_api.as_ref().is_some_and(PurgeApiConfig::is_complete)
    }
}

/// Credentials for the platform-wide purge endpoint.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurgeApiConfig {
    /// Account email sent as `X-Auth-Email`.
    pub email: String,
    /// API key sent as `X-Auth-Key`.
    pub key: String,
    /// Zone identifier.
    pub zone: String,
    /// API base URL.
    #[serde(default = "default_purge_endpoint")]
    pub endpoint: String,
}

impl PurgeApiConfig {
    /// Create credentials for the default endpoint.
    pub fn new(email: impl Into<String>, key: impl Into<String>, zone: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            key: key.into(),
            zone: zone.into(),
            endpoint: default_purge_endpoint(),
        }
    }

    /// Whether every credential field is non-empty.
    pub fn is_complete(&self) -> bool {
        !self.email.is_empty() && !self.key.is_empty() && !self.zone.is_empty()
    }

    /// The purge-everything URL for the configured zone.
    pub fn purge_url(&self) -> String {
        format!(
            "{}/zones/{}/purge_cache",
            self.endpoint.trim_end_matches('/'),
            self.zone
        )
    }
}

// Keep the API key out of logs.
impl std::fmt::Debug for PurgeApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PurgeApiConfig")
            .field("email", &self.email)
            .field("key", &"<redacted>")
            .field("zone", &self.zone)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

fn default_version_key() -> String {
    "html_cache_version".to_string()
}

fn default_purge_endpoint() -> String {
    "https://api.cloudflare.com/client/v4".to_string()
}

fn default_stored_max_age() -> u64 {
    315_360_000
}

fn default_pass_through_paths() -> Vec<String> {
    [
        r"^/workbox-",
        r"^/page-data",
        r"^/offline-app-shell-",
        r"manifest\.webmanifest$",
        r"manifest_en\.webmanifest$",
        r"/sw\.js$",
    ]
    .iter()
    .map(|p| p.to_string())
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = EdgeCacheConfig::default();
        assert_eq!(config.version_key, "html_cache_version");
        assert_eq!(config.stored_max_age, 315_360_000);
        assert_eq!(config.pass_through_paths.len(), 6);
        assert!(config.validate().is_ok());
        assert!(!config.has_purge_api());
    }

    #[test]
    fn test_load_toml() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
kv_store = "EDGE_CACHE"
default_bypass_cookies = ["sessionid", "/^wp_.*$/"]

[purge_api]
email = "ops@example.com"
key = "secret"
zone = "z1"
"#
        )
        .unwrap();

        let config = EdgeCacheConfig::load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.kv_store.as_deref(), Some("EDGE_CACHE"));
        assert!(config.has_purge_api());
        assert_eq!(
            config.purge_api.unwrap().purge_url(),
            "https://api.cloudflare.com/client/v4/zones/z1/purge_cache"
        );
        assert_eq!(config.default_bypass_cookies.unwrap().len(), 2);
    }

    #[test]
    fn test_load_json() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"version_key": "v", "stored_max_age": 60}}"#).unwrap();

        let config = EdgeCacheConfig::load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.version_key, "v");
        assert_eq!(config.stored_max_age, 60);
    }

    #[test]
    fn test_from_toml_str() {
        let config =
            EdgeCacheConfig::from_toml_str("kv_store = \"default\"\nstored_max_age = 120\n")
                .unwrap();
        assert_eq!(config.kv_store.as_deref(), Some("default"));
        assert_eq!(config.stored_max_age, 120);
        assert_eq!(config.pass_through_paths.len(), 6);

        assert!(EdgeCacheConfig::from_toml_str("version_key = \"\"").is_err());
    }

    #[test]
    fn test_origin_timeout() {
        let config = EdgeCacheConfig::from_toml_str("origin_timeout_ms = 2500").unwrap();
        assert_eq!(config.origin_timeout_ms, Some(2500));
        assert_eq!(EdgeCacheConfig::default().origin_timeout_ms, None);
        assert!(EdgeCacheConfig::from_toml_str("origin_timeout_ms = 0").is_err());
    }

    #[test]
    fn test_validate_rejects_bad_pattern() {
        let config = EdgeCacheConfig {
            pass_through_paths: vec!["([".to_string()],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_partial_credentials() {
        let config = EdgeCacheConfig {
            purge_api: Some(PurgeApiConfig::new("ops@example.com", "", "z1")),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_debug_redacts_key() {
        let api = PurgeApiConfig::new("ops@example.com", "secret", "z1");
        let printed = format!("{:?}", api);
        assert!(!printed.contains("secret"));
    }
}

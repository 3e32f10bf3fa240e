//! Platform-wide cache purge.

use std::sync::Arc;

use edge_core::{EdgeRequest, PurgeApiConfig};
use http::Method;

use crate::client::{FetchError, OriginFetch};

/// Calls the hosting platform's purge-everything endpoint.
///
/// Only used when no generation store is configured, since rotating the
/// generation already makes every stored key unreachable.
pub struct ZonePurgeClient {
    config: PurgeApiConfig,
    http: Arc<dyn OriginFetch>,
}

impl ZonePurgeClient {
    /// Create a client sending through `http`.
    pub fn new(config: PurgeApiConfig, http: Arc<dyn OriginFetch>) -> Self {
        Self { config, http }
    }

    /// Build the purge request without sending it.
    pub fn request(&self) -> EdgeRequest {
        let body = serde_json::json!({ "purge_everything": true }).to_string();

        EdgeRequest::new(Method::POST, self.config.purge_url())
            .with_header("X-Auth-Email", &self.config.email)
            .with_header("X-Auth-Key", &self.config.key)
            .with_header("Content-Type", "application/json")
            .with_body(body)
    }

    /// Purge every cached object in the zone.
    pub async fn purge_everything(&self) -> Result<(), FetchError> {
        let request = self.request();
        let url = request.url.clone();
        let response = self.http.fetch(request).await?;

        if !response.status.is_success() {
            return Err(FetchError::Http {
                status: response.status.as_u16(),
                url,
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for ZonePurgeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZonePurgeClient")
            .field("config", &self.config)
            .finish()
    }
}

//! Per-request cache coordination.
//!
//! For each request the coordinator decides between serving from the edge
//! store, going to origin, storing the origin's answer, purging, or leaving
//! the cache out entirely:
//!
//! ```text
//! START -> LOOKUP -> HIT  ----------------------------------> RESPOND
//!                     |  \-> (detached) BACKGROUND_REFRESH
//!                     \-> bypass cookie -+
//!                  -> MISS <-------------+ -> fetch origin -> RESPOND
//!                                             \-> (detached) PURGE / STORE
//! ```
//!
//! Store and generation failures never fail a request; only an origin
//! fetch that yields no response does.

use std::sync::Arc;
#[cfg(not(target_arch = "wasm32"))]
use std::time::Duration;
use std::time::Instant;

use edge_cache::{
    BypassPolicy, CacheBackend, CacheExplainHeaders, CacheKey, CacheKeyCodec, DirectiveParser,
    EdgeCacheStore, Generation, KvStore, MemoryCacheBackend, OriginDirectives, VersionStore,
    CAPABILITY_VALUE, DIRECTIVE_HEADER,
};
use edge_core::{
    EdgeCacheConfig, EdgeRequest, EdgeResponse, LifecycleObserver, LifecyclePhase, RequestId,
};
#[cfg(not(target_arch = "wasm32"))]
use edge_data::TimeoutFetch;
use edge_data::{FetchError, OriginFetch, ZonePurgeClient};
use edge_observability::{CacheMetrics, StructuredLogger};
use futures::FutureExt;
use regex::Regex;

use crate::detached::Spawner;
#[cfg(not(target_arch = "wasm32"))]
use crate::detached::TokioSpawner;
use crate::error::EdgeError;
use crate::status::StatusTrace;

const COMPONENT: &str = "html-edge-cache";

/// Builder for [`RequestCoordinator`].
pub struct CoordinatorBuilder {
    config: EdgeCacheConfig,
    origin: Arc<dyn OriginFetch>,
    kv: Option<Arc<dyn KvStore>>,
    backend: Option<Arc<dyn CacheBackend>>,
    purge_http: Option<Arc<dyn OriginFetch>>,
    spawner: Option<Arc<dyn Spawner>>,
    metrics: Option<Arc<CacheMetrics>>,
    observer: Option<Arc<dyn LifecycleObserver>>,
}

impl CoordinatorBuilder {
    /// Use `kv` as the durable generation store.
    pub fn with_generation_store(mut self, kv: Arc<dyn KvStore>) -> Self {
        self.kv = Some(kv);
        self
    }

    /// Use `backend` as the edge response store (in-memory by default).
    pub fn with_cache_backend(mut self, backend: Arc<dyn CacheBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Send platform purge calls through `http` instead of the origin fetcher.
    pub fn with_purge_http(mut self, http: Arc<dyn OriginFetch>) -> Self {
        self.purge_http = Some(http);
        self
    }

    /// Run detached work on `spawner` (Tokio by default, required on wasm32).
    pub fn with_spawner(mut self, spawner: Arc<dyn Spawner>) -> Self {
        self.spawner = Some(spawner);
        self
    }

    /// Record outcomes into shared `metrics`.
    pub fn with_metrics(mut self, metrics: Arc<CacheMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Report lifecycle phases to `observer`.
    pub fn with_observer(mut self, observer: Arc<dyn LifecycleObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Validate the configuration and assemble the coordinator.
    pub fn build(self) -> Result<RequestCoordinator, EdgeError> {
        self.config
            .validate()
            .map_err(|e| EdgeError::Config(format!("{:#}", e)))?;

        let pass_through = self
            .config
            .pass_through_paths
            .iter()
            .map(|p| Regex::new(p).map_err(|e| EdgeError::Config(e.to_string())))
            .collect::<Result<Vec<_>, _>>()?;

        let versions = match self.kv {
            Some(kv) => VersionStore::new(kv, self.config.version_key.clone()),
            None => VersionStore::disabled(),
        };

        let origin = limit_origin(self.origin, self.config.origin_timeout_ms);
        let purge_http = self.purge_http.unwrap_or_else(|| Arc::clone(&origin));
        let purger = self
            .config
            .purge_api
            .clone()
            .filter(|_| self.config.has_purge_api())
            .map(|api| ZonePurgeClient::new(api, purge_http));

        let spawner = match self.spawner {
            Some(spawner) => spawner,
            None => default_spawner()?,
        };

        let backend: Arc<dyn CacheBackend> = match self.backend {
            Some(backend) => backend,
            None => Arc::new(MemoryCacheBackend::new()),
        };

        let inner = Inner {
            origin,
            versions,
            store: EdgeCacheStore::new(backend).with_stored_max_age(self.config.stored_max_age),
            policy: BypassPolicy::from_config(self.config.default_bypass_cookies.as_deref()),
            purger,
            spawner,
            metrics: self.metrics.unwrap_or_default(),
            observer: self.observer,
            pass_through,
        };

        Ok(RequestCoordinator {
            inner: Arc::new(inner),
        })
    }
}

/// Runs the cache lifecycle for each request.
///
/// Cheap to clone; every clone shares the same stores and configuration.
#[derive(Clone)]
pub struct RequestCoordinator {
    inner: Arc<Inner>,
}

impl RequestCoordinator {
    /// Start building a coordinator that fetches from `origin`.
    pub fn builder(config: EdgeCacheConfig, origin: Arc<dyn OriginFetch>) -> CoordinatorBuilder {
        CoordinatorBuilder {
            config,
            origin,
            kv: None,
            backend: None,
            purge_http: None,
            spawner: None,
            metrics: None,
            observer: None,
        }
    }

    /// Handle one client request.
    pub async fn handle(&self, request: EdgeRequest) -> Result<EdgeResponse, EdgeError> {
        let logger = StructuredLogger::new(RequestId::generate())
            .with_component(COMPONENT)
            .with_route(request.path());
        self.inner.handle(request, logger).await
    }

    /// The generation new requests currently resolve against.
    pub async fn current_generation(&self) -> Generation {
        self.inner.versions.current().await
    }

    /// Shared outcome counters.
    pub fn metrics(&self) -> Arc<CacheMetrics> {
        Arc::clone(&self.inner.metrics)
    }

    /// Whether either invalidation mechanism is available.
    pub fn is_configured(&self) -> bool {
        self.inner.is_configured()
    }
}

impl std::fmt::Debug for RequestCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestCoordinator")
            .field("versions", &self.inner.versions)
            .field("store", &self.inner.store)
            .field("purger", &self.inner.purger)
            .finish()
    }
}

struct Inner {
    origin: Arc<dyn OriginFetch>,
    versions: VersionStore,
    store: EdgeCacheStore,
    policy: BypassPolicy,
    purger: Option<ZonePurgeClient>,
    spawner: Arc<dyn Spawner>,
    metrics: Arc<CacheMetrics>,
    observer: Option<Arc<dyn LifecycleObserver>>,
    pass_through: Vec<Regex>,
}

enum Lookup {
    Hit {
        response: EdgeResponse,
        directives: Option<OriginDirectives>,
    },
    Miss {
        trace: StatusTrace,
        bypass: bool,
    },
}

struct Revalidation {
    response: EdgeResponse,
    purged: bool,
    cached: bool,
}

impl Inner {
    async fn handle(
        self: &Arc<Self>,
        request: EdgeRequest,
        logger: StructuredLogger,
    ) -> Result<EdgeResponse, EdgeError> {
        let started = Instant::now();
        self.phase(LifecyclePhase::Start, started);

        if !self.is_configured()
            || request.headers.contains(DIRECTIVE_HEADER)
            || self.is_pass_through_path(request.path())
        {
            self.metrics.record_pass_through();
            logger.debug("passing request straight to origin");
            return Ok(self.fetch_origin(request, &logger).await?);
        }

        if request.is_no_cache() {
            self.phase(LifecyclePhase::Bypass, started);
            self.metrics.record_pass_through();
            let annotate = request.is_get() && request.accepts_html();
            let response = self.fetch_origin(request, &logger).await?;

            self.phase(LifecyclePhase::Respond, started);
            if annotate && response.is_ok() {
                return Ok(with_explain(
                    response,
                    CacheExplainHeaders::new(StatusTrace::BYPASS_RELOAD),
                ));
            }
            return Ok(response);
        }

        if !request.is_get() || !request.accepts_html() {
            self.metrics.record_pass_through();
            return Ok(self.fetch_origin(request, &logger).await?);
        }

        self.phase(LifecyclePhase::Lookup, started);
        let generation = self.versions.current().await;
        let key = CacheKeyCodec::encode(&request.url, generation);

        let (response, explain) = match self.lookup(&request, &key, &logger).await {
            Lookup::Hit {
                response,
                directives,
            } => {
                self.phase(LifecyclePhase::Hit, started);
                self.metrics.record_hit();
                if directives.is_none() && response.is_ok() {
                    self.schedule_refresh(
                        request.clone(),
                        generation,
                        key.clone(),
                        logger.clone(),
                    );
                }
                let explain = CacheExplainHeaders::new(StatusTrace::HIT)
                    .with_generation(generation)
                    .mark_hit();
                (response, explain)
            }
            Lookup::Miss { mut trace, bypass } => {
                if bypass {
                    self.phase(LifecyclePhase::Bypass, started);
                }
                self.phase(LifecyclePhase::Miss, started);
                self.metrics.record_miss();
                let outcome = self
                    .revalidate(&request, generation, &key, bypass, false, &logger)
                    .await?;
                if outcome.purged {
                    trace.push(StatusTrace::PURGED);
                }
                if outcome.cached {
                    trace.push(StatusTrace::CACHED);
                }
                let explain =
                    CacheExplainHeaders::new(trace.to_string()).with_generation(generation);
                (outcome.response, explain)
            }
        };

        self.phase(LifecyclePhase::Respond, started);
        logger
            .debug_builder("request complete")
            .field("status", explain.status.clone())
            .field("key", key.as_str())
            .emit();

        if response.is_ok() {
            Ok(with_explain(response, explain))
        } else {
            Ok(response)
        }
    }

    async fn lookup(
        &self,
        request: &EdgeRequest,
        key: &CacheKey,
        logger: &StructuredLogger,
    ) -> Lookup {
        match self.store.lookup(key).await {
            Ok(Some(response)) => {
                let directives = DirectiveParser::from_headers(&response.headers);
                if self
                    .policy
                    .evaluate(request.cookie_header().as_deref(), directives.as_ref())
                {
                    self.metrics.record_bypass();
                    let mut trace = StatusTrace::new(StatusTrace::BYPASS_COOKIE);
                    trace.push(StatusTrace::MISS);
                    return Lookup::Miss {
                        trace,
                        bypass: true,
                    };
                }
                Lookup::Hit {
                    response,
                    directives,
                }
            }
            Ok(None) => Lookup::Miss {
                trace: StatusTrace::new(StatusTrace::MISS),
                bypass: false,
            },
            Err(e) => {
                self.metrics.record_read_error();
                logger
                    .warn_builder("cache read failed")
                    .field("key", key.as_str())
                    .field("error", e.to_string())
                    .emit();
                Lookup::Miss {
                    trace: StatusTrace::read_exception(&e.to_string()),
                    bypass: false,
                }
            }
        }
    }

    /// Fetch from origin advertising the protocol, then act on its directives.
    ///
    /// `detached` is set when already running outside the client's request;
    /// a purge is then awaited in place instead of spawned again.
    async fn revalidate(
        self: &Arc<Self>,
        request: &EdgeRequest,
        generation: Generation,
        key: &CacheKey,
        prior_bypass: bool,
        detached: bool,
        logger: &StructuredLogger,
    ) -> Result<Revalidation, FetchError> {
        let origin_request = request
            .clone()
            .with_header(DIRECTIVE_HEADER, CAPABILITY_VALUE);
        let response = self.fetch_origin(origin_request, logger).await?;
        let directives = DirectiveParser::from_headers(&response.headers);

        let purged = directives.as_ref().is_some_and(|d| d.purge);
        if purged && detached {
            self.metrics.record_purge();
            self.purge(generation, logger).await;
        } else if purged {
            self.schedule_purge(generation, logger.clone());
        }

        let bypass = prior_bypass
            || self
                .policy
                .evaluate(request.cookie_header().as_deref(), directives.as_ref());
        let wanted = directives.as_ref().map_or(true, |d| d.cache);
        let cached = wanted
            && request.is_get()
            && request.accepts_html()
            && response.is_ok()
            && !bypass;

        if cached {
            self.schedule_store(key.clone(), response.clone(), logger.clone());
        }

        logger
            .debug_builder("origin response handled")
            .field("generation", generation.to_string())
            .field_bool("purge", purged)
            .field_bool("cached", cached)
            .field_bool("bypass", bypass)
            .emit();

        Ok(Revalidation {
            response,
            purged,
            cached,
        })
    }

    async fn fetch_origin(
        &self,
        request: EdgeRequest,
        logger: &StructuredLogger,
    ) -> Result<EdgeResponse, FetchError> {
        let url = request.url.clone();
        match self.origin.fetch(request).await {
            Ok(response) => Ok(response),
            Err(e) => {
                self.metrics.record_upstream_error();
                logger
                    .warn_builder("origin fetch failed")
                    .field("url", url)
                    .field("error", e.to_string())
                    .emit();
                Err(e)
            }
        }
    }

    fn schedule_store(
        self: &Arc<Self>,
        key: CacheKey,
        response: EdgeResponse,
        logger: StructuredLogger,
    ) {
        let inner = Arc::clone(self);
        let task = async move {
            match inner.store.store(&key, &response).await {
                Ok(()) => inner.metrics.record_store(),
                Err(e) => {
                    inner.metrics.record_store_error();
                    logger
                        .warn_builder("cache write failed")
                        .field("key", key.as_str())
                        .field("error", e.to_string())
                        .emit();
                }
            }
        };
        self.spawner.spawn_detached("cache-store", task.boxed());
    }

    fn schedule_purge(self: &Arc<Self>, seen: Generation, logger: StructuredLogger) {
        self.metrics.record_purge();
        let inner = Arc::clone(self);
        let task = async move { inner.purge(seen, &logger).await };
        self.spawner.spawn_detached("purge", task.boxed());
    }

    fn schedule_refresh(
        self: &Arc<Self>,
        request: EdgeRequest,
        generation: Generation,
        key: CacheKey,
        logger: StructuredLogger,
    ) {
        self.metrics.record_refresh();
        let inner = Arc::clone(self);
        let task = async move {
            if let Err(e) = inner
                .revalidate(&request, generation, &key, false, true, &logger)
                .await
            {
                logger
                    .debug_builder("background refresh failed")
                    .field("error", e.to_string())
                    .emit();
            }
        };
        self.spawner.spawn_detached("background-refresh", task.boxed());
    }

    /// Invalidate everything cached so far.
    ///
    /// `seen` is the generation the triggering request was served under.
    async fn purge(&self, seen: Generation, logger: &StructuredLogger) {
        match self.versions.bump(seen).await {
            Ok(Some(generation)) => {
                logger
                    .info_builder("cache generation advanced")
                    .field("generation", generation.to_string())
                    .emit();
                match self.store.evict_before(generation).await {
                    Ok(removed) => logger
                        .debug_builder("previous generations evicted")
                        .field_i64("entries", removed as i64)
                        .emit(),
                    Err(e) => logger
                        .warn_builder("eviction of previous generations failed")
                        .field("error", e.to_string())
                        .emit(),
                }
            }
            Ok(None) => match &self.purger {
                Some(purger) => {
                    if let Err(e) = purger.purge_everything().await {
                        logger
                            .warn_builder("platform purge failed")
                            .field("error", e.to_string())
                            .emit();
                    }
                }
                None => {
                    logger.warn("purge requested but no invalidation mechanism is configured")
                }
            },
            Err(e) => {
                logger
                    .warn_builder("cache generation bump failed")
                    .field("error", e.to_string())
                    .emit();
            }
        }
    }

    fn is_configured(&self) -> bool {
        self.versions.is_enabled() || self.purger.is_some()
    }

    fn is_pass_through_path(&self, path: &str) -> bool {
        self.pass_through.iter().any(|re| re.is_match(path))
    }

    fn phase(&self, phase: LifecyclePhase, started: Instant) {
        if let Some(observer) = &self.observer {
            observer.on_phase(phase, started.elapsed());
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn limit_origin(origin: Arc<dyn OriginFetch>, timeout_ms: Option<u64>) -> Arc<dyn OriginFetch> {
    match timeout_ms {
        Some(ms) => Arc::new(TimeoutFetch::new(origin).with_timeout(Duration::from_millis(ms))),
        None => origin,
    }
}

#[cfg(target_arch = "wasm32")]
fn limit_origin(origin: Arc<dyn OriginFetch>, _timeout_ms: Option<u64>) -> Arc<dyn OriginFetch> {
    origin
}

#[cfg(not(target_arch = "wasm32"))]
fn default_spawner() -> Result<Arc<dyn Spawner>, EdgeError> {
    Ok(Arc::new(TokioSpawner))
}

#[cfg(target_arch = "wasm32")]
fn default_spawner() -> Result<Arc<dyn Spawner>, EdgeError> {
    Err(EdgeError::Config(
        "no default spawner on this target, use with_spawner".to_string(),
    ))
}

fn with_explain(response: EdgeResponse, explain: CacheExplainHeaders) -> EdgeResponse {
    let EdgeResponse {
        status,
        headers,
        body,
    } = response;
    EdgeResponse {
        status,
        headers: explain.apply(headers),
        body,
    }
}

//! The Spin HTTP entry point.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use futures::SinkExt;
use http::StatusCode;
use spin_sdk::http::{Fields, IncomingRequest, OutgoingResponse, ResponseOutparam};
use spin_sdk::http_component;

use edge_sdk::edge_cache::{KvCacheBackend, SpinKvStore};
use edge_sdk::edge_core::{EdgeCacheConfig, EdgeResponse, RequestId};
use edge_sdk::edge_data::SpinOriginFetch;
use edge_sdk::edge_executor::{DeferredSpawner, RequestCoordinator};
use edge_sdk::edge_observability::StructuredLogger;

use crate::convert::{edge_method, edge_request, header_list, origin_url};

const CONFIG: &str = include_str!("../edge-cache.toml");
const ORIGIN_BASE_VARIABLE: &str = "origin_base";
const CACHE_PREFIX: &str = "html:";

/// Main HTTP handler.
#[http_component]
async fn handle_html_edge_cache(req: IncomingRequest, response_out: ResponseOutparam) {
    let logger = StructuredLogger::new(RequestId::generate()).with_component("html-edge-cache");
    let spawner = Arc::new(DeferredSpawner::new());

    let response = match serve(req, spawner.clone()).await {
        Ok(response) => response,
        Err(e) => {
            logger
                .warn_builder("request failed")
                .field("error", format!("{:#}", e))
                .emit();
            EdgeResponse::new(StatusCode::BAD_GATEWAY)
                .with_header("content-type", "text/plain; charset=utf-8")
                .with_body("Bad Gateway")
        }
    };

    if let Err(e) = respond(response, response_out).await {
        logger
            .warn_builder("failed to write response")
            .field("error", format!("{:#}", e))
            .emit();
    }

    // The response is out; finish cache writes and purges before exiting.
    let ran = spawner.run_pending().await;
    logger
        .debug_builder("detached tasks finished")
        .field_i64("count", ran as i64)
        .emit();
}

async fn serve(req: IncomingRequest, spawner: Arc<DeferredSpawner>) -> Result<EdgeResponse> {
    let config = EdgeCacheConfig::from_toml_str(CONFIG)?;
    let origin_base = spin_sdk::variables::get(ORIGIN_BASE_VARIABLE)
        .map_err(|e| anyhow!("variable {} unavailable: {:?}", ORIGIN_BASE_VARIABLE, e))?;

    let method = edge_method(&req.method())?;
    let url = origin_url(&origin_base, &req.path_with_query().unwrap_or_default());
    let headers = req.headers().entries();
    let body = req
        .into_body()
        .await
        .map_err(|e| anyhow!("failed to read request body: {:?}", e))?;
    let request = edge_request(method, url, headers, body)?;

    let mut builder = RequestCoordinator::builder(config.clone(), Arc::new(SpinOriginFetch))
        .with_spawner(spawner);
    if let Some(name) = &config.kv_store {
        let kv = Arc::new(SpinKvStore::open(name)?);
        builder = builder
            .with_generation_store(kv.clone())
            .with_cache_backend(Arc::new(KvCacheBackend::new(kv, CACHE_PREFIX)));
    }

    let coordinator = builder.build()?;
    Ok(coordinator.handle(request).await?)
}

async fn respond(response: EdgeResponse, response_out: ResponseOutparam) -> Result<()> {
    let headers = Fields::from_list(&header_list(&response.headers))
        .map_err(|e| anyhow!("invalid response headers: {:?}", e))?;
    let outgoing = OutgoingResponse::new(headers);
    outgoing
        .set_status_code(response.status.as_u16())
        .map_err(|_| anyhow!("invalid status {}", response.status))?;

    let mut body = outgoing.take_body();
    response_out.set(outgoing);
    body.send(response.body)
        .await
        .map_err(|e| anyhow!("failed to write response body: {:?}", e))?;
    Ok(())
}

//! `POST /setup`: idempotent (re)configuration from the registry (§4.8).
//! Picks whichever registered classifier worker answers first as the
//! canonical source of `numclasses`/`blockshape` (§8 scenario 6: two
//! workers register, one deregisters, `/setup` picks the survivor).

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use bp_blocking::BlockGrid;
use bp_bus::{FinishedBusClient, HttpBusClient, TaskQueueClient};
use bp_cache::{CacheClient, HttpCacheClient};
use bp_registry::RegistryClient;
use bp_types::{Dim, PipelineError, RegistryKey};

use crate::raw_client::{RawClient, ReqwestRawClient};
use crate::state::{AppState, GatewayConfig, DEFAULT_CONCURRENCY};

async fn probe_worker(http: &reqwest::Client, worker_ip: &str) -> Option<(u64, bp_types::Coord5)> {
    let numclasses_url = format!("http://{worker_ip}/prediction/numclasses");
    let blockshape_url = format!("http://{worker_ip}/prediction/blockshape");
    let numclasses: u64 = http.get(&numclasses_url).send().await.ok()?.text().await.ok()?.trim().parse().ok()?;
    let blockshape_text = http.get(&blockshape_url).send().await.ok()?.text().await.ok()?;
    let blockshape = bp_types::coord::parse_underscore_coord(blockshape_text.trim()).ok()?;
    Some((numclasses, blockshape))
}

pub async fn setup(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match run_setup(&state).await {
        Ok(()) => (StatusCode::OK, "configured").into_response(),
        Err(e) => (
            StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            e.to_string(),
        )
            .into_response(),
    }
}

async fn run_setup(state: &AppState) -> Result<(), PipelineError> {
    let registry = &state.registry;

    let data_provider_ip = require_scalar(registry, RegistryKey::DataProviderIp).await?;
    let cache_ip = require_scalar(registry, RegistryKey::CacheIp).await?;
    let broker_ip = require_scalar(registry, RegistryKey::MessageBrokerIp).await?;

    let worker_ips = registry
        .get(RegistryKey::PixelClassificationWorkerIps)
        .await?
        .and_then(|v| v.as_list().map(|l| l.to_vec()))
        .unwrap_or_default();
    if worker_ips.is_empty() {
        return Err(PipelineError::Configuration(
            "no classifier worker registered: cannot determine numclasses/blockshape".into(),
        ));
    }

    let http = reqwest::Client::new();
    let mut probed = None;
    for ip in &worker_ips {
        if let Some(result) = probe_worker(&http, ip).await {
            probed = Some(result);
            break;
        }
    }
    let (num_classes, block_shape) = probed.ok_or_else(|| {
        PipelineError::Configuration("none of the registered classifier workers answered /setup probes".into())
    })?;

    let raw: std::sync::Arc<dyn RawClient> =
        std::sync::Arc::new(ReqwestRawClient::new(format!("http://{data_provider_ip}")));
    let volume_shape = raw.shape().await?;
    let dim = if volume_shape[3] <= 1 { Dim::Two } else { Dim::Three };
    let grid = BlockGrid::new(volume_shape, block_shape, dim)?;

    let cache: std::sync::Arc<dyn CacheClient> =
        std::sync::Arc::new(HttpCacheClient::new(format!("http://{cache_ip}")));
    let bus_client = std::sync::Arc::new(HttpBusClient::new(format!("http://{broker_ip}")));
    let task_bus: std::sync::Arc<dyn TaskQueueClient> = bus_client.clone();
    let finished_bus: std::sync::Arc<dyn FinishedBusClient> = bus_client;

    state
        .install(GatewayConfig {
            raw,
            cache,
            task_bus,
            finished_bus,
            grid,
            volume_shape,
            dim,
            num_classes,
            concurrency: std::sync::Arc::new(tokio::sync::Semaphore::new(DEFAULT_CONCURRENCY)),
        })
        .await;

    registry.log("INFO", "gateway", "setup complete").await.ok();
    Ok(())
}

async fn require_scalar(registry: &Arc<dyn bp_registry::RegistryClient>, key: RegistryKey) -> Result<String, PipelineError> {
    registry
        .get(key)
        .await?
        .and_then(|v| v.as_scalar().map(str::to_string))
        .ok_or_else(|| PipelineError::Configuration(format!("{} not set in registry", key.as_str())))
}

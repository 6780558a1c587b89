//! Classifier worker entry point: self-registers, leases tasks, computes,
//! deregisters on shutdown (§4.9 supplement).

use std::sync::Arc;
use std::time::Duration;

use bp_bus::{FinishedBusClient, HttpBusClient, TaskQueueClient};
use bp_cache::{CacheClient, HttpCacheClient};
use bp_registry::{HttpRegistryClient, RegistryClient};
use bp_types::{Dim, RegistryKey, RegistryValue};
use bp_worker::{process_task, ConstantClassifierKernel, ReqwestRawClient, WorkerInfo};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bp_worker=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let registry_url = env_or("REGISTRY_URL", "http://127.0.0.1:7001");
    let self_ip = env_or("WORKER_SELF_IP", "127.0.0.1:7100");
    let http_addr = env_or("WORKER_HTTP_ADDR", "0.0.0.0:7100");
    let concurrency: usize = env_or("WORKER_CONCURRENCY", "1").parse().unwrap_or(1);
    let num_classes: usize = env_or("WORKER_NUM_CLASSES", "2").parse().unwrap_or(2);

    let registry: Arc<dyn RegistryClient> = Arc::new(HttpRegistryClient::new(registry_url));
    registry
        .set(
            RegistryKey::PixelClassificationWorkerIps,
            RegistryValue::List(vec![self_ip.clone()]),
        )
        .await?;
    registry.log("INFO", &self_ip, "worker registered").await.ok();

    let cache_ip = match registry.get(RegistryKey::CacheIp).await? {
        Some(v) => v.as_scalar().unwrap_or_default().to_string(),
        None => {
            anyhow::bail!("CACHE_IP not set in registry: /setup has not run on the gateway yet")
        }
    };
    let broker_ip = match registry.get(RegistryKey::MessageBrokerIp).await? {
        Some(v) => v.as_scalar().unwrap_or_default().to_string(),
        None => anyhow::bail!("MESSAGE_BROKER_IP not set in registry"),
    };
    let data_provider_ip = match registry.get(RegistryKey::DataProviderIp).await? {
        Some(v) => v.as_scalar().unwrap_or_default().to_string(),
        None => anyhow::bail!("DATA_PROVIDER_IP not set in registry"),
    };
    let blocksize = match registry.get(RegistryKey::Blocksize).await? {
        Some(v) => bp_types::coord::parse_underscore_coord(v.as_scalar().unwrap_or_default())?,
        None => anyhow::bail!("BLOCKSIZE not set in registry"),
    };

    let raw = Arc::new(ReqwestRawClient::new(format!("http://{data_provider_ip}")));
    let volume_shape = raw.shape().await?;
    let dim = if volume_shape[3] <= 1 { Dim::Two } else { Dim::Three };
    let grid = Arc::new(bp_blocking::BlockGrid::new(volume_shape, blocksize, dim)?);

    let cache: Arc<dyn CacheClient> = Arc::new(HttpCacheClient::new(format!("http://{cache_ip}")));
    let bus_client = Arc::new(HttpBusClient::new(format!("http://{broker_ip}")));
    let task_bus: Arc<dyn TaskQueueClient> = bus_client.clone();
    let finished_bus: Arc<dyn FinishedBusClient> = bus_client.clone();
    let kernel = Arc::new(ConstantClassifierKernel::new(num_classes));

    tracing::info!(self_ip, concurrency, "worker started, leasing tasks");

    let worker_info = Arc::new(WorkerInfo {
        num_classes: num_classes as u64,
        block_shape: blocksize,
        cache: cache.clone(),
    });
    let http_router = bp_worker::server::router(worker_info);
    let http_listener = tokio::net::TcpListener::bind(&http_addr).await?;
    tokio::spawn(async move {
        if let Err(e) = axum::serve(http_listener, http_router).await {
            tracing::error!(error = %e, "worker http server exited");
        }
    });

    let mut handles = Vec::new();
    for _ in 0..concurrency {
        let grid = grid.clone();
        let raw = raw.clone();
        let cache = cache.clone();
        let task_bus = task_bus.clone();
        let finished_bus = finished_bus.clone();
        let kernel = kernel.clone();
        handles.push(tokio::spawn(async move {
            loop {
                match task_bus.lease(Duration::from_secs(20)).await {
                    Ok(Some(id)) => {
                        if let Err(e) = process_task(&grid, volume_shape, id, raw.as_ref(), kernel.as_ref(), &cache, &finished_bus).await {
                            tracing::error!(block_id = %id, error = %e, "task failed, placeholder left in cache for later retry");
                        }
                    }
                    Ok(None) => continue,
                    Err(e) => {
                        tracing::warn!(error = %e, "task lease failed, backing off");
                        tokio::time::sleep(Duration::from_millis(500)).await;
                    }
                }
            }
        }));
    }

    tokio::select! {
        _ = futures::future::join_all(handles) => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!(self_ip, "shutting down, deregistering");
            let _ = registry.remove(RegistryKey::PixelClassificationWorkerIps, &self_ip).await;
        }
    }

    Ok(())
}

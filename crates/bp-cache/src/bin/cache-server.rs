//! Cache server entry point.

use std::sync::Arc;
use std::time::Duration;

use bp_cache::{server, CacheStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_ADDR: &str = "0.0.0.0:7002";
const DEFAULT_BYTE_BUDGET: usize = 4 * 1024 * 1024 * 1024; // 4 GiB
const DEFAULT_TTL_SECS: u64 = 120;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bp_cache=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr: std::net::SocketAddr = std::env::var("CACHE_ADDR")
        .unwrap_or_else(|_| DEFAULT_ADDR.to_string())
        .parse()?;
    let byte_budget: usize = std::env::var("CACHE_BYTE_BUDGET")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_BYTE_BUDGET);
    let ttl_secs: u64 = std::env::var("CACHE_PLACEHOLDER_TTL_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_TTL_SECS);

    tracing::info!(%addr, byte_budget, ttl_secs, "starting cache server");

    let store = Arc::new(CacheStore::new(byte_budget, Duration::from_secs(ttl_secs)));
    let app = server::router(store);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

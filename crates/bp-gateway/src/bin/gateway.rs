//! Gateway entry point. Listens immediately; every route other than
//! `/setup` returns a `Configuration` error (HTTP 503) until `/setup` has
//! run at least once, matching §8 scenario 6.

use std::sync::Arc;

use bp_gateway::{routes, AppState};
use bp_registry::{HttpRegistryClient, RegistryClient};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bp_gateway=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let registry_url = env_or("REGISTRY_URL", "http://127.0.0.1:7001");
    let addr = env_or("GATEWAY_ADDR", "0.0.0.0:7000");
    let self_ip = env_or("GATEWAY_SELF_IP", "127.0.0.1:7000");

    let registry: Arc<dyn RegistryClient> = Arc::new(HttpRegistryClient::new(registry_url));
    registry
        .set(bp_types::RegistryKey::GatewayIp, bp_types::RegistryValue::Scalar(self_ip))
        .await
        .ok();

    let state = Arc::new(AppState::new(registry));
    let app = routes::router(state);

    tracing::info!(addr, "gateway listening (call POST /setup to configure)");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

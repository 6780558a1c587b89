//! Bus server entry point: hosts both the task queue and the finished bus.

use std::sync::Arc;

use bp_bus::{server, server::BusState, FinishedBus, TaskQueueStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_ADDR: &str = "0.0.0.0:7003";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bp_bus=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr: std::net::SocketAddr = std::env::var("BUS_ADDR")
        .unwrap_or_else(|_| DEFAULT_ADDR.to_string())
        .parse()?;

    tracing::info!(%addr, "starting message bus server");

    let state = BusState {
        tasks: Arc::new(TaskQueueStore::new()),
        finished: Arc::new(FinishedBus::new()),
    };
    let app = server::router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

//! Thresholder service: self-registers under `THRESHOLDING_IP`, exposes
//! `/labelimage/<fmt>/roi`, and is otherwise a plain HTTP client of the
//! gateway's own `/prediction/raw/roi` endpoint (§4.7, Open Question (c)).

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use bp_registry::{HttpRegistryClient, RegistryClient};
use bp_thresholder::gateway_client::GatewayClient;
use bp_thresholder::{label_frame, ThresholdParams};
use bp_types::{coord::parse_underscore_coord, Dim, PipelineError, RegistryKey, Roi};

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

struct AppState {
    gateway: GatewayClient,
    dim: Dim,
    params: ThresholdParams,
}

fn parse_sigmas(s: &str) -> Result<[f32; 3], PipelineError> {
    let parts: Vec<&str> = s.split('_').collect();
    if parts.len() != 3 {
        return Err(PipelineError::Configuration(format!(
            "THRESHOLD_SIGMAS must have 3 underscore-joined components, got {}",
            parts.len()
        )));
    }
    let mut out = [0.0f32; 3];
    for (i, p) in parts.iter().enumerate() {
        out[i] = p
            .parse()
            .map_err(|_| PipelineError::Configuration(format!("THRESHOLD_SIGMAS component {i} ({p}) is not a float")))?;
    }
    Ok(out)
}

async fn labelimage_roi(
    State(state): State<Arc<AppState>>,
    Path(_fmt): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let result = async {
        let min = params
            .get("extents_min")
            .ok_or_else(|| PipelineError::Validation("missing extents_min".into()))?;
        let max = params
            .get("extents_max")
            .ok_or_else(|| PipelineError::Validation("missing extents_max".into()))?;
        let begin = parse_underscore_coord(min)?;
        let end = parse_underscore_coord(max)?;
        let roi = Roi::new(begin, end)?;

        let (bytes, shape) = label_frame(&state.gateway, &roi, state.dim, state.params).await?;
        Ok::<_, PipelineError>((bytes, shape))
    }
    .await;

    match result {
        Ok((bytes, shape)) => (
            StatusCode::OK,
            [
                ("x-dtype", "uint32".to_string()),
                ("x-shape", bp_types::coord::format_underscore_coord(&shape)),
            ],
            bytes,
        )
            .into_response(),
        Err(e) => (
            StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            e.to_string(),
        )
            .into_response(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bp_thresholder=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let registry_url = env_or("REGISTRY_URL", "http://127.0.0.1:7001");
    let self_ip = env_or("THRESHOLDER_SELF_IP", "127.0.0.1:7005");
    let addr = env_or("THRESHOLDER_ADDR", "0.0.0.0:7005");

    let registry: Arc<dyn RegistryClient> = Arc::new(HttpRegistryClient::new(registry_url));
    registry
        .set(RegistryKey::ThresholdingIp, bp_types::RegistryValue::Scalar(self_ip.clone()))
        .await?;
    registry.log("INFO", &self_ip, "thresholder registered").await.ok();

    let gateway_ip = match registry.get(RegistryKey::GatewayIp).await? {
        Some(v) => v.as_scalar().unwrap_or_default().to_string(),
        None => anyhow::bail!("GATEWAY_IP not set in registry: /setup has not run on the gateway yet"),
    };
    let channel: u64 = match registry.get(RegistryKey::ThresholdChannel).await? {
        Some(v) => v
            .as_scalar()
            .unwrap_or_default()
            .parse()
            .map_err(|_| anyhow::anyhow!("THRESHOLD_CHANNEL is not an integer"))?,
        None => anyhow::bail!("THRESHOLD_CHANNEL not set in registry"),
    };
    let value: f32 = match registry.get(RegistryKey::ThresholdValue).await? {
        Some(v) => v
            .as_scalar()
            .unwrap_or_default()
            .parse()
            .map_err(|_| anyhow::anyhow!("THRESHOLD_VALUE is not a float"))?,
        None => anyhow::bail!("THRESHOLD_VALUE not set in registry"),
    };
    let sigmas = match registry.get(RegistryKey::ThresholdSigmas).await? {
        Some(v) => parse_sigmas(v.as_scalar().unwrap_or_default())?,
        None => anyhow::bail!("THRESHOLD_SIGMAS not set in registry"),
    };

    let gateway = GatewayClient::new(format!("http://{gateway_ip}"));
    let dim = gateway.dim().await?;

    let state = Arc::new(AppState {
        gateway,
        dim,
        params: ThresholdParams { channel, value, sigmas },
    });

    let app = Router::new()
        .route("/labelimage/:fmt/roi", get(labelimage_roi))
        .with_state(state);

    tracing::info!(addr, "thresholder listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

//! `GET /labelimage/<fmt>/roi`: requires a single-time-frame ROI (§4.7) and
//! forwards to whichever thresholder is currently registered under
//! `THRESHOLDING_IP`. The gateway does not run the segmentation itself —
//! the thresholder calls back into `/prediction/raw/roi` for the inputs.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use bp_registry::RegistryClient;
use bp_types::{coord::parse_underscore_coord, PipelineError, RegistryKey, Roi};

use crate::state::AppState;

pub async fn labelimage_roi(
    State(state): State<Arc<AppState>>,
    Path(fmt): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    match handle(&state, &fmt, &params).await {
        Ok(bytes) => (StatusCode::OK, bytes).into_response(),
        Err(e) => (
            StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            e.to_string(),
        )
            .into_response(),
    }
}

async fn handle(state: &AppState, fmt: &str, params: &HashMap<String, String>) -> Result<Vec<u8>, PipelineError> {
    let min = params.get("extents_min").ok_or_else(|| PipelineError::Validation("missing extents_min".into()))?;
    let max = params.get("extents_max").ok_or_else(|| PipelineError::Validation("missing extents_max".into()))?;
    let roi = Roi::new(parse_underscore_coord(min)?, parse_underscore_coord(max)?)?;
    if !roi.is_single_frame() {
        return Err(PipelineError::Validation("labelimage requires a single-time-frame ROI".into()));
    }

    let thresholder_ip = state
        .registry
        .get(RegistryKey::ThresholdingIp)
        .await?
        .and_then(|v| v.as_scalar().map(str::to_string))
        .ok_or_else(|| PipelineError::Configuration("THRESHOLDING_IP not set in registry".into()))?;

    let url = format!(
        "http://{thresholder_ip}/labelimage/{fmt}/roi?extents_min={}&extents_max={}",
        bp_types::coord::format_underscore_coord(&roi.begin),
        bp_types::coord::format_underscore_coord(&roi.end),
    );
    let resp = reqwest::Client::new()
        .get(&url)
        .send()
        .await
        .map_err(|e| PipelineError::RemoteFetch(e.to_string()))?;
    if !resp.status().is_success() {
        return Err(PipelineError::RemoteFetch(format!("thresholder returned {}", resp.status())));
    }
    resp.bytes().await.map(|b| b.to_vec()).map_err(|e| PipelineError::RemoteFetch(e.to_string()))
}

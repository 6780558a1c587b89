//! Plain-text introspection endpoints (§6): `/prediction/info/numclasses`,
//! `/raw/info/{dtype,shape,dim}`.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::raw_client::RawClient;
use crate::state::AppState;

fn config_error(e: bp_types::PipelineError) -> axum::response::Response {
    (
        StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        e.to_string(),
    )
        .into_response()
}

pub async fn numclasses(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.current().await {
        Ok(cfg) => cfg.num_classes.to_string().into_response(),
        Err(e) => config_error(e),
    }
}

pub async fn raw_dtype(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let cfg = match state.current().await {
        Ok(cfg) => cfg,
        Err(e) => return config_error(e),
    };
    match cfg.raw.dtype().await {
        Ok(dtype) => dtype.tag().to_string().into_response(),
        Err(e) => config_error(e),
    }
}

pub async fn raw_shape(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.current().await {
        Ok(cfg) => bp_types::coord::format_underscore_coord(&cfg.volume_shape).into_response(),
        Err(e) => config_error(e),
    }
}

pub async fn raw_dim(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.current().await {
        Ok(cfg) => match cfg.dim {
            bp_types::Dim::Two => "2".into_response(),
            bp_types::Dim::Three => "3".into_response(),
        },
        Err(e) => config_error(e),
    }
}

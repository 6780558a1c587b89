//! `GET /raw/<fmt>/roi`: direct fan-out to the raw server, never coalesced
//! through the cache (Open Question (b), DESIGN.md).

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use bp_types::{coord::parse_underscore_coord, PipelineError, Roi};

use crate::raw_client::RawClient;
use crate::state::AppState;

pub async fn raw_roi(
    State(state): State<Arc<AppState>>,
    Path(fmt): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let result = async {
        if !matches!(fmt.as_str(), "raw" | "tiff" | "png" | "hdf5") {
            return Err(PipelineError::Validation(format!("unrecognized fmt: {fmt}")));
        }
        let cfg = state.current().await?;
        let min = params.get("extents_min").ok_or_else(|| PipelineError::Validation("missing extents_min".into()))?;
        let max = params.get("extents_max").ok_or_else(|| PipelineError::Validation("missing extents_max".into()))?;
        let roi = Roi::new(parse_underscore_coord(min)?, parse_underscore_coord(max)?)?;

        let _permit = cfg.concurrency.acquire().await.map_err(|_| {
            PipelineError::Configuration("concurrency semaphore closed".into())
        })?;
        // TODO: tiff/png/hdf5 encoding is out of scope; every fmt returns the
        // same dense little-endian bytes the raw server produced.
        cfg.raw.fetch_roi(&roi).await
    }
    .await;

    match result {
        Ok(bytes) => (StatusCode::OK, bytes).into_response(),
        Err(e) => (
            StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            e.to_string(),
        )
            .into_response(),
    }
}

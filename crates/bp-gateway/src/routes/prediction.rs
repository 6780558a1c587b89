//! `GET /prediction/<fmt>/roi`: the core request-coalescing orchestration
//! (§4.2-§4.5). Listener-first: the completion collector subscribes to the
//! finished bus *before* any cache probe, so a completion racing the first
//! probe is never missed.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use bp_bus::TaskQueueClient;
use bp_cache::{CacheClient, CacheGet};
use bp_collector::CompletionCollector;
use bp_types::{coord::parse_underscore_coord, BlockId, BlockDescriptor, PipelineError, Roi};

use crate::stitch::{stitch_and_crop, StitchBlock};
use crate::state::AppState;

pub async fn prediction_roi(
    State(state): State<Arc<AppState>>,
    Path(fmt): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let result = handle(&state, &fmt, &params).await;
    match result {
        Ok(bytes) => (StatusCode::OK, bytes).into_response(),
        Err(e) => (
            StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            e.to_string(),
        )
            .into_response(),
    }
}

async fn handle(state: &AppState, fmt: &str, params: &HashMap<String, String>) -> Result<Vec<u8>, PipelineError> {
    if !matches!(fmt, "raw" | "tiff" | "png" | "hdf5") {
        return Err(PipelineError::Validation(format!("unrecognized fmt: {fmt}")));
    }
    let cfg = state.current().await?;

    let min = params.get("extents_min").ok_or_else(|| PipelineError::Validation("missing extents_min".into()))?;
    let max = params.get("extents_max").ok_or_else(|| PipelineError::Validation("missing extents_max".into()))?;
    let roi = Roi::new(parse_underscore_coord(min)?, parse_underscore_coord(max)?)?;

    let _permit = cfg
        .concurrency
        .acquire()
        .await
        .map_err(|_| PipelineError::Configuration("concurrency semaphore closed".into()))?;

    let block_ids = cfg.grid.blocks_in(&roi.begin, &roi.end)?;
    let required: HashSet<BlockId> = block_ids.iter().copied().collect();

    // Listener-first (§4.5 step 1): subscribe before the first cache probe.
    let collector = CompletionCollector::start(required, cfg.cache.clone(), cfg.finished_bus.clone()).await?;

    let mut local: HashMap<BlockId, (Vec<u8>, BlockDescriptor)> = HashMap::new();
    let mut satisfied_locally = Vec::new();
    let mut to_enqueue = Vec::new();

    for &id in &block_ids {
        match cfg.cache.get(id, true).await? {
            CacheGet::Payload(bytes, descriptor) => {
                local.insert(id, (bytes, descriptor));
                satisfied_locally.push(id);
            }
            CacheGet::Placeholder => {
                // Someone else already owns this block's computation.
            }
            CacheGet::Absent => {
                // This probe just installed the placeholder: we own enqueuing it.
                to_enqueue.push(id);
            }
        }
    }
    collector.remove_requirements(satisfied_locally);
    for id in to_enqueue {
        cfg.task_bus.enqueue(id).await?;
    }

    let remote = collector.finish().await?;
    local.extend(remote);

    let mut blocks = Vec::with_capacity(block_ids.len());
    for id in &block_ids {
        let (payload, descriptor) = local
            .remove(id)
            .ok_or_else(|| PipelineError::CacheProtocolViolation {
                block_id: id.0,
                detail: "completion collector finished without this block".into(),
            })?;
        let payload_shape = match descriptor {
            BlockDescriptor::Payload { shape, .. } => shape,
            BlockDescriptor::Placeholder => {
                return Err(PipelineError::CacheProtocolViolation {
                    block_id: id.0,
                    detail: "resolved block still carries a placeholder descriptor".into(),
                })
            }
        };
        let block_ref = cfg.grid.block(*id)?;
        blocks.push(StitchBlock {
            begin: block_ref.begin,
            end: block_ref.end,
            payload,
            payload_shape,
        });
    }

    Ok(stitch_and_crop(&blocks, &roi, bp_types::Dtype::F32.size_bytes()))
}

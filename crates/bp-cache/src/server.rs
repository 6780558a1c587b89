//! HTTP surface for the cache service.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use bp_types::{BlockDescriptor, BlockId};
use serde::Deserialize;

use crate::store::{CacheStore, GetOutcome};

const DESCRIPTOR_HEADER: &str = "x-block-descriptor";

pub fn router(store: Arc<CacheStore>) -> Router {
    Router::new()
        .route("/cache", get(list_blocks).delete(clear_cache))
        .route("/cache/:id", get(get_block).put(put_block))
        .with_state(store)
}

#[derive(Deserialize)]
struct GetQuery {
    #[serde(default)]
    insert_placeholder: bool,
}

async fn get_block(
    Path(id): Path<u64>,
    Query(q): Query<GetQuery>,
    State(store): State<Arc<CacheStore>>,
) -> impl IntoResponse {
    match store.get(BlockId(id), q.insert_placeholder) {
        GetOutcome::Payload(bytes, descriptor) => {
            let mut headers = HeaderMap::new();
            headers.insert(
                DESCRIPTOR_HEADER,
                HeaderValue::from_str(&descriptor.encode()).unwrap(),
            );
            (StatusCode::OK, headers, bytes).into_response()
        }
        GetOutcome::Placeholder => StatusCode::NO_CONTENT.into_response(),
        GetOutcome::Absent => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn put_block(
    Path(id): Path<u64>,
    State(store): State<Arc<CacheStore>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let descriptor_raw = match headers.get(DESCRIPTOR_HEADER).and_then(|v| v.to_str().ok()) {
        Some(v) => v,
        None => return (StatusCode::BAD_REQUEST, "missing x-block-descriptor header").into_response(),
    };
    let descriptor = match BlockDescriptor::decode(descriptor_raw) {
        Some(BlockDescriptor::Payload { shape, dtype }) => BlockDescriptor::Payload { shape, dtype },
        _ => return (StatusCode::BAD_REQUEST, "malformed or placeholder descriptor on PUT").into_response(),
    };
    store.put(BlockId(id), body.to_vec(), descriptor);
    StatusCode::NO_CONTENT.into_response()
}

async fn list_blocks(State(store): State<Arc<CacheStore>>) -> impl IntoResponse {
    let ids: Vec<u64> = store.list().into_iter().map(|id| id.0).collect();
    Json(ids)
}

async fn clear_cache(State(store): State<Arc<CacheStore>>) -> impl IntoResponse {
    store.clear();
    StatusCode::NO_CONTENT
}

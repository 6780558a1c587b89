//! HTTP surface for the message bus: the task queue and the finished-block
//! broadcast, combined behind one axum `Router` (they share a process in
//! this deployment, per §9 "two bus variants... MUST NOT mix").

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    routing::{get, post},
    Json, Router,
};
use bp_types::BlockId;
use futures::stream::Stream;
use serde::Deserialize;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use crate::finished_bus::FinishedBus;
use crate::task_queue::TaskQueueStore;

#[derive(Clone)]
pub struct BusState {
    pub tasks: Arc<TaskQueueStore>,
    pub finished: Arc<FinishedBus>,
}

pub fn router(state: BusState) -> Router {
    Router::new()
        .route("/bus/tasks", post(enqueue_task))
        .route("/bus/tasks/lease", post(lease_task))
        .route("/bus/finished", post(publish_finished))
        .route("/bus/finished/stream", get(stream_finished))
        .with_state(state)
}

#[derive(Deserialize)]
struct IdBody {
    id: u64,
}

async fn enqueue_task(State(state): State<BusState>, Json(body): Json<IdBody>) -> impl IntoResponse {
    state.tasks.enqueue(BlockId(body.id));
    StatusCode::NO_CONTENT
}

#[derive(Deserialize)]
struct LeaseQuery {
    #[serde(default = "default_timeout_ms")]
    timeout_ms: u64,
}

fn default_timeout_ms() -> u64 {
    20_000
}

async fn lease_task(State(state): State<BusState>, Query(q): Query<LeaseQuery>) -> impl IntoResponse {
    match state.tasks.lease(Duration::from_millis(q.timeout_ms)).await {
        Some(id) => Json(serde_json::json!({ "id": id.0 })).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

async fn publish_finished(State(state): State<BusState>, Json(body): Json<IdBody>) -> impl IntoResponse {
    state.finished.publish(BlockId(body.id));
    StatusCode::NO_CONTENT
}

async fn stream_finished(
    State(state): State<BusState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.finished.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|item| match item {
        Ok(id) => Some(Ok(Event::default().data(id.0.to_string()))),
        // A slow subscriber that lagged behind the broadcast buffer: the
        // dropped ids are gone from this stream for good. The only consumer
        // that cares, `bp_collector::CompletionCollector`, covers this gap
        // itself with a periodic cache poll rather than anything here.
        Err(_) => None,
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

//! The classifier worker's own tiny HTTP surface, consumed by the gateway's
//! `/setup` (`spec.md` §6: `/prediction/numclasses`, `/prediction/blockshape`,
//! `/prediction/cachedblockids`). Task execution itself runs over the bus,
//! not this server — it exists only so the gateway can introspect whichever
//! worker it picks as canonical.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::Router;
use bp_cache::CacheClient;
use bp_types::coord::format_underscore_coord;
use bp_types::Coord5;

pub struct WorkerInfo {
    pub num_classes: u64,
    pub block_shape: Coord5,
    pub cache: Arc<dyn CacheClient>,
}

async fn numclasses(State(info): State<Arc<WorkerInfo>>) -> String {
    info.num_classes.to_string()
}

async fn blockshape(State(info): State<Arc<WorkerInfo>>) -> String {
    format_underscore_coord(&info.block_shape)
}

async fn cachedblockids(State(info): State<Arc<WorkerInfo>>) -> axum::Json<Vec<u64>> {
    let ids = info.cache.list().await.unwrap_or_default();
    axum::Json(ids.into_iter().map(|id| id.0).collect())
}

async fn setup() -> &'static str {
    // Idempotent no-op: this worker has nothing to (re)configure locally,
    // the gateway's own /setup is what rebuilds the pipeline-wide snapshot.
    "ok"
}

pub fn router(info: Arc<WorkerInfo>) -> Router {
    Router::new()
        .route("/prediction/numclasses", get(numclasses))
        .route("/prediction/blockshape", get(blockshape))
        .route("/prediction/cachedblockids", get(cachedblockids))
        .route("/setup", axum::routing::post(setup))
        .with_state(info)
}

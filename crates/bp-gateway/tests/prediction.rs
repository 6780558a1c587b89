//! End-to-end coalescing/stitching tests against an in-process `AppState`,
//! with fake in-memory cache/bus/task-queue backends standing in for the
//! HTTP-backed ones a real deployment would use (mirrors the teacher's
//! `bpmn-lite-server/tests/` mix of unit tests plus top-level integration
//! suites).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use bp_blocking::BlockGrid;
use bp_bus::{FinishedBus, FinishedBusClient, TaskQueueClient, TaskQueueStore};
use bp_cache::{CacheClient, CacheGet, CacheStore};
use bp_gateway::raw_client::RawClient;
use bp_gateway::{routes, AppState, GatewayConfig};
use bp_registry::RegistryClient;
use bp_types::{BlockDescriptor, BlockId, Coord5, Dim, Dtype, PipelineError, Roi};
use tower::ServiceExt;

struct LocalCache(Arc<CacheStore>);

#[async_trait]
impl CacheClient for LocalCache {
    async fn get(&self, id: BlockId, insert_placeholder: bool) -> Result<CacheGet, PipelineError> {
        Ok(match self.0.get(id, insert_placeholder) {
            bp_cache::GetOutcome::Payload(b, d) => CacheGet::Payload(b, d),
            bp_cache::GetOutcome::Placeholder => CacheGet::Placeholder,
            bp_cache::GetOutcome::Absent => CacheGet::Absent,
        })
    }
    async fn put(&self, id: BlockId, payload: Vec<u8>, descriptor: BlockDescriptor) -> Result<(), PipelineError> {
        self.0.put(id, payload, descriptor);
        Ok(())
    }
    async fn list(&self) -> Result<Vec<BlockId>, PipelineError> {
        Ok(self.0.list())
    }
    async fn clear(&self) -> Result<(), PipelineError> {
        self.0.clear();
        Ok(())
    }
}

struct LocalBus {
    tasks: Arc<TaskQueueStore>,
    finished: Arc<FinishedBus>,
}

#[async_trait]
impl TaskQueueClient for LocalBus {
    async fn enqueue(&self, id: BlockId) -> Result<(), PipelineError> {
        self.tasks.enqueue(id);
        Ok(())
    }
    async fn lease(&self, timeout: Duration) -> Result<Option<BlockId>, PipelineError> {
        Ok(self.tasks.lease(timeout).await)
    }
}

#[async_trait]
impl FinishedBusClient for LocalBus {
    async fn publish(&self, id: BlockId) -> Result<(), PipelineError> {
        self.finished.publish(id);
        Ok(())
    }
    async fn subscribe(&self) -> Result<std::pin::Pin<Box<dyn futures::Stream<Item = BlockId> + Send>>, PipelineError> {
        use tokio_stream::StreamExt;
        use tokio_stream::wrappers::BroadcastStream;
        let rx = self.finished.subscribe();
        Ok(Box::pin(BroadcastStream::new(rx).filter_map(|r| async move { r.ok() })))
    }
}

struct ConstantRaw;

#[async_trait]
impl RawClient for ConstantRaw {
    async fn fetch_roi(&self, roi: &Roi) -> Result<Vec<u8>, PipelineError> {
        let shape = roi.shape();
        let n = (shape[0] * shape[1] * shape[2] * shape[3] * shape[4]) as usize;
        Ok(vec![0u8; n])
    }
    async fn dtype(&self) -> Result<Dtype, PipelineError> {
        Ok(Dtype::U8)
    }
    async fn shape(&self) -> Result<Coord5, PipelineError> {
        Ok([1, 16, 16, 1, 1])
    }
    async fn dim(&self) -> Result<Dim, PipelineError> {
        Ok(Dim::Two)
    }
}

struct NoopRegistry;

#[async_trait]
impl RegistryClient for NoopRegistry {
    async fn get(&self, _key: bp_types::RegistryKey) -> Result<Option<bp_types::RegistryValue>, PipelineError> {
        Ok(None)
    }
    async fn set(&self, _key: bp_types::RegistryKey, _value: bp_types::RegistryValue) -> Result<(), PipelineError> {
        Ok(())
    }
    async fn remove(&self, _key: bp_types::RegistryKey, _value: &str) -> Result<(), PipelineError> {
        Ok(())
    }
    async fn log(&self, _level: &str, _service_id: &str, _message: &str) -> Result<(), PipelineError> {
        Ok(())
    }
}

/// Builds a gateway app wired to in-memory backends, with an 8x8 volume
/// split into 4x4 blocks (four blocks total).
async fn test_app() -> (axum::Router, Arc<CacheStore>, Arc<TaskQueueStore>, Arc<FinishedBus>) {
    let cache_store = Arc::new(CacheStore::new(1 << 20, Duration::from_secs(60)));
    let task_store = Arc::new(TaskQueueStore::new());
    let finished = Arc::new(FinishedBus::new());

    let cache: Arc<dyn CacheClient> = Arc::new(LocalCache(cache_store.clone()));
    let bus = Arc::new(LocalBus {
        tasks: task_store.clone(),
        finished: finished.clone(),
    });
    let task_bus: Arc<dyn TaskQueueClient> = bus.clone();
    let finished_bus: Arc<dyn FinishedBusClient> = bus;

    let grid = BlockGrid::new([1, 8, 8, 1, 1], [1, 4, 4, 1, 1], Dim::Two).unwrap();

    let state = Arc::new(AppState::new(Arc::new(NoopRegistry)));
    state
        .install(GatewayConfig {
            raw: Arc::new(ConstantRaw),
            cache,
            task_bus,
            finished_bus,
            grid,
            volume_shape: [1, 8, 8, 1, 1],
            dim: Dim::Two,
            num_classes: 1,
            concurrency: Arc::new(tokio::sync::Semaphore::new(8)),
        })
        .await;

    (routes::router(state), cache_store, task_store, finished)
}

/// A fake classifier worker: leases whatever tasks arrive and immediately
/// completes them with a constant one-class probability block. `invocations`
/// counts each leased-and-computed task so callers can assert the coalescing
/// property directly (§8 scenario 2: the classifier runs exactly once per
/// block, independent of how many gateway requests asked for it).
fn spawn_fake_worker(
    grid: BlockGrid,
    cache: Arc<CacheStore>,
    tasks: Arc<TaskQueueStore>,
    finished: Arc<FinishedBus>,
    invocations: Arc<std::sync::atomic::AtomicU64>,
) {
    tokio::spawn(async move {
        loop {
            if let Some(id) = tasks.lease(Duration::from_secs(5)).await {
                invocations.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                let block = grid.block(id).unwrap();
                let n = block.shape()[1..4].iter().product::<u64>() as usize;
                cache.put(
                    id,
                    vec![0u8; n * 4],
                    BlockDescriptor::Payload { shape: block.shape(), dtype: Dtype::F32 },
                );
                finished.publish(id);
            }
        }
    });
}

#[tokio::test]
async fn trivial_roundtrip_stitches_all_four_blocks() {
    let (app, cache_store, task_store, finished) = test_app().await;
    let grid = BlockGrid::new([1, 8, 8, 1, 1], [1, 4, 4, 1, 1], Dim::Two).unwrap();
    let invocations = Arc::new(std::sync::atomic::AtomicU64::new(0));
    spawn_fake_worker(grid, cache_store, task_store, finished, invocations);

    let req = Request::builder()
        .uri("/prediction/raw/roi?extents_min=0_0_0_0_0&extents_max=1_8_8_1_1")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    assert_eq!(bytes.len(), 8 * 8 * 4);
}

#[tokio::test]
async fn eight_concurrent_requests_coalesce_to_one_computation() {
    let (app, cache_store, task_store, finished) = test_app().await;
    let grid = BlockGrid::new([1, 8, 8, 1, 1], [1, 4, 4, 1, 1], Dim::Two).unwrap();
    let invocations = Arc::new(std::sync::atomic::AtomicU64::new(0));
    spawn_fake_worker(grid, cache_store, task_store.clone(), finished, invocations.clone());

    let mut handles = Vec::new();
    for _ in 0..8 {
        let app = app.clone();
        handles.push(tokio::spawn(async move {
            let req = Request::builder()
                .uri("/prediction/raw/roi?extents_min=0_0_0_0_0&extents_max=1_4_4_1_1")
                .body(Body::empty())
                .unwrap();
            let resp = app.oneshot(req).await.unwrap();
            assert_eq!(resp.status(), StatusCode::OK);
        }));
    }
    for h in handles {
        h.await.unwrap();
    }
    // The single block the ROI covers must have been computed exactly once,
    // despite eight concurrent callers (§8 scenario 2) — not merely "the
    // task queue ended up empty", which an 8x-computed block would satisfy
    // just as well once the (infinite-loop) fake worker drains it.
    assert_eq!(invocations.load(std::sync::atomic::Ordering::SeqCst), 1);
    assert!(task_store.is_empty());
}

#[tokio::test]
async fn setup_fails_with_no_classifier_worker_registered() {
    let state = Arc::new(AppState::new(Arc::new(NoopRegistry)));
    let app = routes::router(state);
    let req = Request::builder().method("POST").uri("/setup").body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn unconfigured_gateway_rejects_prediction_requests() {
    let state = Arc::new(AppState::new(Arc::new(NoopRegistry)));
    let app = routes::router(state);
    let req = Request::builder()
        .uri("/prediction/raw/roi?extents_min=0_0_0_0_0&extents_max=1_8_8_1_1")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}

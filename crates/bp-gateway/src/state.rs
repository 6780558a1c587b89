//! Immutable configuration snapshot (**REDESIGN FLAG applied**, SPEC_FULL.md
//! §4.8): the gateway used to keep a backend handle, blocking grid, and
//! endpoint strings as ad hoc global mutable state. Here, `/setup` builds one
//! `GatewayConfig` value and swaps it into a `RwLock`, the same `Arc<RwLock<..>>`
//! read-mostly-snapshot idiom `stewardship_routes.rs`'s `StewardshipState`
//! uses for its per-session channel map. Handlers take a read lock, clone the
//! `Arc`, and drop the lock before any further `.await`.

use std::sync::Arc;

use bp_bus::{FinishedBusClient, TaskQueueClient};
use bp_cache::CacheClient;
use bp_blocking::BlockGrid;
use bp_registry::RegistryClient;
use bp_types::{Coord5, Dim, PipelineError};
use tokio::sync::{RwLock, Semaphore};

use crate::raw_client::RawClient;

/// Default number of outstanding outbound calls a single gateway process
/// will allow concurrently (§5, range 4-40).
pub const DEFAULT_CONCURRENCY: usize = 8;

pub struct GatewayConfig {
    pub raw: Arc<dyn RawClient>,
    pub cache: Arc<dyn CacheClient>,
    pub task_bus: Arc<dyn TaskQueueClient>,
    pub finished_bus: Arc<dyn FinishedBusClient>,
    pub grid: BlockGrid,
    pub volume_shape: Coord5,
    pub dim: Dim,
    pub num_classes: u64,
    pub concurrency: Arc<Semaphore>,
}

pub struct AppState {
    pub registry: Arc<dyn RegistryClient>,
    config: RwLock<Option<Arc<GatewayConfig>>>,
}

impl AppState {
    pub fn new(registry: Arc<dyn RegistryClient>) -> Self {
        Self {
            registry,
            config: RwLock::new(None),
        }
    }

    pub async fn install(&self, config: GatewayConfig) {
        let mut guard = self.config.write().await;
        *guard = Some(Arc::new(config));
    }

    /// Returns the current snapshot, or a `Configuration` error if `/setup`
    /// has never run (§7).
    pub async fn current(&self) -> Result<Arc<GatewayConfig>, PipelineError> {
        let guard = self.config.read().await;
        guard
            .clone()
            .ok_or_else(|| PipelineError::Configuration("gateway not configured: call /setup first".into()))
    }
}

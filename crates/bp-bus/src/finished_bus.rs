//! Broadcast fan-out of block completions (`spec.md` §4.4), server side.
//! One named channel; late subscribers do not see past events. Modeled on
//! the teacher's per-session broadcast channel in
//! `rust/src/api/stewardship_routes.rs`, collapsed to the single global
//! channel the finished-block bus contract calls for.

use bp_types::BlockId;
use tokio::sync::broadcast;

/// Capacity chosen generously: a slow subscriber that falls behind by more
/// than this many completions sees its backlog silently dropped (`Lagged`),
/// not replayed. `bp_collector::CompletionCollector` is the only consumer
/// that needs to survive this — it does so with its own ~50 ms cache-poll
/// fallback (`crates/bp-collector/src/lib.rs`), not anything in this crate.
const CHANNEL_CAPACITY: usize = 4096;

pub struct FinishedBus {
    sender: broadcast::Sender<BlockId>,
}

impl Default for FinishedBus {
    fn default() -> Self {
        Self::new()
    }
}

impl FinishedBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn publish(&self, id: BlockId) {
        // No live subscribers is not an error: broadcast fan-out is
        // best-effort by definition (§4.4).
        let _ = self.sender.send(id);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BlockId> {
        self.sender.subscribe()
    }
}

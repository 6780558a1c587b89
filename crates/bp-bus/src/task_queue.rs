//! Point-to-point task fan-out (`spec.md` §4.3). Durable for the lifetime of
//! the process; each task is delivered to exactly one subscriber under
//! normal operation (competing consumers, prefetch = 1); ordering is not
//! guaranteed.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use bp_types::BlockId;
use tokio::sync::Notify;

pub struct TaskQueueStore {
    queue: Mutex<VecDeque<BlockId>>,
    notify: Notify,
}

impl Default for TaskQueueStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskQueueStore {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
        }
    }

    pub fn enqueue(&self, id: BlockId) {
        self.queue.lock().unwrap().push_back(id);
        self.notify.notify_one();
    }

    fn try_lease(&self) -> Option<BlockId> {
        self.queue.lock().unwrap().pop_front()
    }

    /// Leases at most one task, waiting up to `timeout` for one to appear
    /// (long-poll semantics, one delivery per worker at a time).
    pub async fn lease(&self, timeout: Duration) -> Option<BlockId> {
        if let Some(id) = self.try_lease() {
            return Some(id);
        }
        let wait = self.notify.notified();
        tokio::select! {
            _ = wait => self.try_lease(),
            _ = tokio::time::sleep(timeout) => None,
        }
    }

    pub fn len(&self) -> usize {
        self.queue.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

//! Shared, size-bounded block store with request coalescing (`spec.md`
//! §4.2). The atomicity of `get(id, insert_placeholder = true)` is the key
//! correctness property of the whole pipeline: two concurrent callers must
//! never both cause the same block to be computed. We get that by holding a
//! single `std::sync::Mutex` across the entire check-then-insert decision —
//! the lock is never held across an `.await`, so contention is microseconds.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use bp_types::{BlockDescriptor, BlockId};
use lru::LruCache;

/// Outcome of a `get` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GetOutcome {
    /// Payload resident, returned.
    Payload(Vec<u8>, BlockDescriptor),
    /// A placeholder is in flight for this block (by this or another caller).
    Placeholder,
    /// Nothing was present, and the caller did not ask to insert a placeholder.
    Absent,
}

struct Entry {
    payload: Option<Vec<u8>>,
    descriptor: BlockDescriptor,
    inserted_at: Instant,
    size_bytes: usize,
}

pub struct CacheStore {
    inner: Mutex<LruCache<BlockId, Entry>>,
    byte_budget: usize,
    current_bytes: Mutex<usize>,
    placeholder_ttl: Duration,
}

impl CacheStore {
    pub fn new(byte_budget: usize, placeholder_ttl: Duration) -> Self {
        Self {
            // `LruCache` wants a capacity in entries; we use an effectively
            // unbounded entry cap and enforce the real budget in bytes below.
            inner: Mutex::new(LruCache::new(NonZeroUsize::new(1 << 20).unwrap())),
            byte_budget,
            current_bytes: Mutex::new(0),
            placeholder_ttl,
        }
    }

    /// Atomic probe-and-maybe-insert-placeholder (§4.2).
    pub fn get(&self, id: BlockId, insert_placeholder: bool) -> GetOutcome {
        let mut cache = self.inner.lock().unwrap();

        if let Some(entry) = cache.peek(&id) {
            if matches!(entry.descriptor, BlockDescriptor::Placeholder)
                && entry.inserted_at.elapsed() > self.placeholder_ttl
            {
                // Expired placeholder: treat as absent (§4.2 supplement, TTL).
                if let Some(old) = cache.pop(&id) {
                    self.release_bytes(old.size_bytes);
                }
            }
        }

        match cache.get(&id) {
            Some(entry) => match &entry.payload {
                Some(bytes) => GetOutcome::Payload(bytes.clone(), entry.descriptor.clone()),
                None => GetOutcome::Placeholder,
            },
            None => {
                if insert_placeholder {
                    self.insert_locked(&mut cache, id, None, BlockDescriptor::Placeholder);
                    GetOutcome::Absent
                } else {
                    GetOutcome::Absent
                }
            }
        }
    }

    /// Writes both bytes and descriptor; overwrites any placeholder for `id`.
    pub fn put(&self, id: BlockId, payload: Vec<u8>, descriptor: BlockDescriptor) {
        let mut cache = self.inner.lock().unwrap();
        self.insert_locked(&mut cache, id, Some(payload), descriptor);
    }

    pub fn list(&self) -> Vec<BlockId> {
        self.inner
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, e)| e.payload.is_some())
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn clear(&self) {
        let mut cache = self.inner.lock().unwrap();
        cache.clear();
        *self.current_bytes.lock().unwrap() = 0;
    }

    fn insert_locked(&self, cache: &mut LruCache<BlockId, Entry>, id: BlockId, payload: Option<Vec<u8>>, descriptor: BlockDescriptor) {
        let size_bytes = payload.as_ref().map(|p| p.len()).unwrap_or(0);
        if let Some(old) = cache.put(
            id,
            Entry {
                payload,
                descriptor,
                inserted_at: Instant::now(),
                size_bytes,
            },
        ) {
            self.release_bytes(old.size_bytes);
        }
        self.claim_bytes(size_bytes);
        self.evict_to_budget(cache);
    }

    fn claim_bytes(&self, n: usize) {
        *self.current_bytes.lock().unwrap() += n;
    }

    fn release_bytes(&self, n: usize) {
        let mut cur = self.current_bytes.lock().unwrap();
        *cur = cur.saturating_sub(n);
    }

    /// Placeholders are evictable like any other entry (§4.2): if a
    /// placeholder is evicted, a later request legitimately re-schedules
    /// the computation rather than hanging forever.
    fn evict_to_budget(&self, cache: &mut LruCache<BlockId, Entry>) {
        while *self.current_bytes.lock().unwrap() > self.byte_budget {
            match cache.pop_lru() {
                Some((_, evicted)) => self.release_bytes(evicted.size_bytes),
                None => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> CacheStore {
        CacheStore::new(1 << 20, Duration::from_secs(60))
    }

    #[test]
    fn first_get_with_placeholder_inserts_and_returns_absent() {
        let s = store();
        assert_eq!(s.get(BlockId(0), true), GetOutcome::Absent);
    }

    #[test]
    fn second_concurrent_get_sees_placeholder() {
        let s = store();
        let _ = s.get(BlockId(0), true);
        assert_eq!(s.get(BlockId(0), true), GetOutcome::Placeholder);
    }

    #[test]
    fn put_overwrites_placeholder_and_is_visible() {
        let s = store();
        let _ = s.get(BlockId(0), true);
        s.put(BlockId(0), vec![1, 2, 3], BlockDescriptor::Payload { shape: [1, 1, 1, 1, 1], dtype: bp_types::Dtype::U8 });
        match s.get(BlockId(0), true) {
            GetOutcome::Payload(bytes, _) => assert_eq!(bytes, vec![1, 2, 3]),
            other => panic!("expected payload, got {other:?}"),
        }
    }

    #[test]
    fn list_only_reports_resident_payloads() {
        let s = store();
        let _ = s.get(BlockId(0), true); // placeholder only
        s.put(BlockId(1), vec![9], BlockDescriptor::Payload { shape: [1, 1, 1, 1, 1], dtype: bp_types::Dtype::U8 });
        assert_eq!(s.list(), vec![BlockId(1)]);
    }

    #[test]
    fn clear_removes_everything() {
        let s = store();
        s.put(BlockId(0), vec![1], BlockDescriptor::Payload { shape: [1, 1, 1, 1, 1], dtype: bp_types::Dtype::U8 });
        s.clear();
        assert!(s.list().is_empty());
    }

    #[test]
    fn expired_placeholder_is_treated_as_absent() {
        let s = CacheStore::new(1 << 20, Duration::from_millis(1));
        let _ = s.get(BlockId(0), true);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(s.get(BlockId(0), true), GetOutcome::Absent);
    }

    #[test]
    fn eviction_frees_bytes_over_budget() {
        let s = CacheStore::new(10, Duration::from_secs(60));
        s.put(BlockId(0), vec![0u8; 8], BlockDescriptor::Payload { shape: [1, 1, 1, 1, 1], dtype: bp_types::Dtype::U8 });
        s.put(BlockId(1), vec![0u8; 8], BlockDescriptor::Payload { shape: [1, 1, 1, 1, 1], dtype: bp_types::Dtype::U8 });
        // total inserted (16 bytes) exceeds the 10 byte budget: block 0 (LRU) must be gone
        let resident = s.list();
        assert!(!resident.contains(&BlockId(0)));
        assert!(resident.contains(&BlockId(1)));
    }
}

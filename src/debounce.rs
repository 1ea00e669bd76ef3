use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Per-key table of pending remote writes.
///
/// Each `(record id, field key)` pair holds at most one payload and one
/// deadline. Pushing again within the window replaces the payload and resets
/// the deadline, so only the latest value is ever sent; distinct keys mature
/// independently. The caller supplies `now`, which keeps the coalescing
/// contract testable without real timers.
#[derive(Debug)]
pub struct DebounceTable<T> {
    window: Duration,
    pending: HashMap<(String, String), Pending<T>>,
}

#[derive(Debug)]
struct Pending<T> {
    payload: T,
    deadline: Instant,
}

impl<T> DebounceTable<T> {
    pub fn new(window: Duration) -> Self {
        DebounceTable {
            window,
            pending: HashMap::new(),
        }
    }

    /// Record (or replace) the pending write for `(id, key)` and restart its
    /// window.
    pub fn push(&mut self, id: &str, key: &str, payload: T, now: Instant) {
        self.pending.insert(
            (id.to_string(), key.to_string()),
            Pending {
                payload,
                deadline: now + self.window,
            },
        );
    }

    /// Drain every entry whose window has elapsed, in key order.
    pub fn take_due(&mut self, now: Instant) -> Vec<(String, T)> {
        let due: Vec<(String, String)> = self
            .pending
            .iter()
            .filter(|(_, p)| p.deadline <= now)
            .map(|(k, _)| k.clone())
            .collect();
        self.drain_keys(due)
    }

    /// Drain everything regardless of deadline.
    pub fn take_all(&mut self) -> Vec<(String, T)> {
        let keys: Vec<(String, String)> = self.pending.keys().cloned().collect();
        self.drain_keys(keys)
    }

    fn drain_keys(&mut self, mut keys: Vec<(String, String)>) -> Vec<(String, T)> {
        keys.sort();
        keys.into_iter()
            .filter_map(|k| self.pending.remove(&k).map(|p| (k.0, p.payload)))
            .collect()
    }

    /// Drop every pending write for one record. Used when the record is
    /// deleted or transferred out of the partition.
    pub fn cancel_for(&mut self, id: &str) {
        self.pending.retain(|(rid, _), _| rid != id);
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

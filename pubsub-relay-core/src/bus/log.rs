//! Fixed-capacity, order-preserving message log

use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;

/// Number of payloads kept when no capacity is configured
pub const DEFAULT_LOG_CAPACITY: usize = 10;

/// Thread-safe log holding the `capacity` most recent entries
///
/// Entries are kept in arrival order (most recent last). Every read and
/// write goes through a single mutex, so an append is never observed
/// half-done and no entry is lost other than by eviction of the oldest.
pub struct BoundedLog<T> {
    capacity: usize,
    entries: Mutex<VecDeque<T>>,
}

/// Log of raw message payloads shared by the ingestion adapters
pub type MessageLog = BoundedLog<Bytes>;

impl<T: Clone> BoundedLog<T> {
    /// Create a log with the given capacity (a capacity of zero is treated as one)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Append `entry` as the newest element, evicting the oldest on overflow
    pub fn append(&self, entry: T) {
        let mut entries = self.entries.lock();
        entries.push_back(entry);
        while entries.len() > self.capacity {
            entries.pop_front();
        }
    }

    /// Copy of the current entries in arrival order
    pub fn snapshot(&self) -> Vec<T> {
        self.entries.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<T: Clone> Default for BoundedLog<T> {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

impl<T> fmt::Debug for BoundedLog<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedLog")
            .field("capacity", &self.capacity)
            .field("len", &self.entries.lock().len())
            .finish()
    }
}

use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;

use crate::constants::DUPLICATE_CACHE_CAPACITY;

/// Bounded record of message ids already seen, used to suppress relay loops
/// and duplicate delivery in a mesh with cyclic topology.
///
/// An unbounded `HashSet` (the original design) would leak memory over a
/// long-running deployment; capping it at [`DUPLICATE_CACHE_CAPACITY`] and
/// evicting least-recently-seen ids is the permitted bounded-memory
/// evolution of that design.
pub struct DuplicateCache {
    inner: Mutex<LruCache<String, ()>>,
}

impl DuplicateCache {
    pub fn new() -> Self {
        Self::with_capacity(DUPLICATE_CACHE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(1).unwrap());
        Self { inner: Mutex::new(LruCache::new(capacity)) }
    }

    /// Records `msg_id` as seen, returning `true` if it was *not* already present.
    pub fn insert_if_new(&self, msg_id: &str) -> bool {
        let mut guard = self.inner.lock();
        if guard.contains(msg_id) {
            guard.promote(msg_id);
            false
        } else {
            guard.put(msg_id.to_string(), ());
            true
        }
    }

    pub fn contains(&self, msg_id: &str) -> bool {
        self.inner.lock().contains(msg_id)
    }
}

impl Default for DuplicateCache {
    fn default() -> Self {
        Self::new()
    }
}

//! In-memory preview cache with strict LRU eviction.
//!
//! Backed by `lru::LruCache` behind a `parking_lot::Mutex`. The lock is
//! held only for the duration of a single map operation, never across a
//! decode, so contention between the coordinator and worker completions
//! stays negligible.
//!
//! Eviction is deterministic: inserting into a full cache always evicts
//! exactly the least-recently-used entry. That determinism is why this tier
//! uses `lru` rather than a frequency-sketch cache - the coordinator's
//! behavior under scrubbing (revisit recent offsets, drop the oldest) maps
//! directly onto strict LRU.

use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;

use super::CacheKey;
use crate::preview::PreviewFrame;

/// Bounded LRU cache mapping [`CacheKey`] to decoded frames; tier 1.
pub struct PreviewCache {
    inner: Mutex<LruCache<CacheKey, PreviewFrame>>,
    capacity: usize,
}

impl PreviewCache {
    /// Creates a cache holding up to `capacity` entries.
    ///
    /// A capacity of zero is treated as one entry.
    pub fn new(capacity: usize) -> Self {
        let bound = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(bound)),
            capacity: bound.get(),
        }
    }

    /// Looks up a frame, refreshing its recency on a hit.
    pub fn get(&self, key: &CacheKey) -> Option<PreviewFrame> {
        self.inner.lock().get(key).cloned()
    }

    /// Inserts a frame, evicting the least-recently-used entry when full.
    pub fn put(&self, key: CacheKey, frame: PreviewFrame) {
        self.inner.lock().put(key, frame);
    }

    /// Removes a single entry.
    pub fn remove(&self, key: &CacheKey) -> Option<PreviewFrame> {
        self.inner.lock().pop(key)
    }

    /// Returns true if the key is present, without refreshing recency.
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.inner.lock().contains(key)
    }

    /// Returns the current number of entries.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Returns true if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Returns the configured capacity in entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drops all entries.
    pub fn clear(&self) {
        self.inner.lock().clear();
    }
}

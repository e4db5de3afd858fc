//! Lookup chain across the memory and persistent tiers.
//!
//! `TieredCache` owns the memory tier and holds an optional handle to a
//! persistent tier. The lookup contract:
//!
//! - memory hit: returned directly, recency refreshed
//! - persistent hit: promoted into the memory tier, then returned
//! - persistent errors: logged and treated as misses, never propagated
//!
//! Writes go to the memory tier always; the persistent tier is written only
//! when the caller says so (on decode completion), which bounds write
//! volume during rapid scrubbing.

use std::sync::Arc;

use tracing::warn;

use super::memory::PreviewCache;
use super::persistent::PersistentCache;
use super::CacheKey;
use crate::preview::PreviewFrame;

/// Dual-tier cache facade used by the coordinator.
pub struct TieredCache {
    memory: PreviewCache,
    persistent: Option<Arc<dyn PersistentCache>>,
}

impl TieredCache {
    /// Creates a tiered cache with the given memory capacity and optional
    /// persistent tier.
    pub fn new(memory_capacity: usize, persistent: Option<Arc<dyn PersistentCache>>) -> Self {
        Self {
            memory: PreviewCache::new(memory_capacity),
            persistent,
        }
    }

    /// Returns true when a usable persistent tier is attached.
    pub fn has_persistent_tier(&self) -> bool {
        self.persistent.as_ref().is_some_and(|p| p.is_enabled())
    }

    /// Synchronous memory-tier lookup.
    pub fn get_memory(&self, key: &CacheKey) -> Option<PreviewFrame> {
        self.memory.get(key)
    }

    /// Persistent-tier lookup with promotion.
    ///
    /// On a hit the frame is inserted into the memory tier before being
    /// returned, so the next lookup for this key is a memory hit. Errors
    /// degrade to misses.
    pub async fn get_persistent(&self, key: &CacheKey) -> Option<PreviewFrame> {
        let tier = self.persistent.as_ref().filter(|p| p.is_enabled())?;

        match tier.get(key).await {
            Ok(Some(frame)) => {
                self.memory.put(key.clone(), frame.clone());
                Some(frame)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(key = %key, error = %e, "persistent cache read failed, treating as miss");
                None
            }
        }
    }

    /// Stores a frame in the memory tier and, when `write_persistent` is
    /// set, in the persistent tier as well.
    pub async fn put(&self, key: &CacheKey, frame: PreviewFrame, write_persistent: bool) {
        self.memory.put(key.clone(), frame.clone());

        if !write_persistent {
            return;
        }
        if let Some(tier) = self.persistent.as_ref().filter(|p| p.is_enabled()) {
            if let Err(e) = tier.put(key, &frame).await {
                warn!(key = %key, error = %e, "persistent cache write failed");
            }
        }
    }

    /// Drops all memory-tier entries. The persistent tier is untouched.
    pub fn clear(&self) {
        self.memory.clear();
    }

    /// Access to the memory tier (for stats and tests).
    pub fn memory(&self) -> &PreviewCache {
        &self.memory
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::persistent::PersistentCacheError;
    use crate::preview::{BoxFuture, SourceId};
    use parking_lot::Mutex;
    use std::collections::HashMap;

    fn key(offset: u64) -> CacheKey {
        CacheKey::new(SourceId::new("rom.bin"), offset)
    }

    fn frame(tag: u8) -> PreviewFrame {
        PreviewFrame::new(vec![tag; 16], 4, 4, format!("s{tag}"))
    }

    /// In-memory stand-in for the persistent tier.
    struct MapCache {
        entries: Mutex<HashMap<String, PreviewFrame>>,
        enabled: bool,
        failing: bool,
    }

    impl MapCache {
        fn new() -> Self {
            Self {
                entries: Mutex::new(HashMap::new()),
                enabled: true,
                failing: false,
            }
        }

        fn failing() -> Self {
            Self {
                failing: true,
                ..Self::new()
            }
        }

        fn insert(&self, key: &CacheKey, frame: PreviewFrame) {
            self.entries.lock().insert(key.storage_key(), frame);
        }

        fn contains(&self, key: &CacheKey) -> bool {
            self.entries.lock().contains_key(&key.storage_key())
        }
    }

    impl PersistentCache for MapCache {
        fn get<'a>(
            &'a self,
            key: &'a CacheKey,
        ) -> BoxFuture<'a, Result<Option<PreviewFrame>, PersistentCacheError>> {
            Box::pin(async move {
                if self.failing {
                    return Err(PersistentCacheError::Backend("injected failure".into()));
                }
                Ok(self.entries.lock().get(&key.storage_key()).cloned())
            })
        }

        fn put<'a>(
            &'a self,
            key: &'a CacheKey,
            frame: &'a PreviewFrame,
        ) -> BoxFuture<'a, Result<bool, PersistentCacheError>> {
            Box::pin(async move {
                if self.failing {
                    return Err(PersistentCacheError::Backend("injected failure".into()));
                }
                self.insert(key, frame.clone());
                Ok(true)
            })
        }

        fn is_enabled(&self) -> bool {
            self.enabled
        }
    }

    #[tokio::test]
    async fn test_memory_hit() {
        let cache = TieredCache::new(4, None);
        cache.put(&key(1), frame(1), false).await;
        assert_eq!(cache.get_memory(&key(1)), Some(frame(1)));
    }

    #[tokio::test]
    async fn test_persistent_hit_promotes() {
        let tier2 = Arc::new(MapCache::new());
        tier2.insert(&key(1), frame(1));
        let cache = TieredCache::new(4, Some(tier2));

        assert!(cache.get_memory(&key(1)).is_none());
        let hit = cache.get_persistent(&key(1)).await.unwrap();
        assert_eq!(hit, frame(1));

        // Promoted: next lookup hits the memory tier.
        assert_eq!(cache.get_memory(&key(1)), Some(frame(1)));
    }

    #[tokio::test]
    async fn test_put_writes_both_tiers_on_completion() {
        let tier2 = Arc::new(MapCache::new());
        let cache = TieredCache::new(4, Some(Arc::clone(&tier2) as Arc<dyn PersistentCache>));

        cache.put(&key(1), frame(1), true).await;
        assert!(cache.get_memory(&key(1)).is_some());
        assert!(tier2.contains(&key(1)));
    }

    #[tokio::test]
    async fn test_put_memory_only() {
        let tier2 = Arc::new(MapCache::new());
        let cache = TieredCache::new(4, Some(Arc::clone(&tier2) as Arc<dyn PersistentCache>));

        cache.put(&key(1), frame(1), false).await;
        assert!(cache.get_memory(&key(1)).is_some());
        assert!(!tier2.contains(&key(1)));
    }

    #[tokio::test]
    async fn test_disabled_tier_skipped() {
        let tier2 = Arc::new(MapCache {
            enabled: false,
            ..MapCache::new()
        });
        tier2.insert(&key(1), frame(1));
        let cache = TieredCache::new(4, Some(tier2));

        assert!(!cache.has_persistent_tier());
        assert!(cache.get_persistent(&key(1)).await.is_none());
    }

    #[tokio::test]
    async fn test_read_failure_degrades_to_miss() {
        let cache = TieredCache::new(4, Some(Arc::new(MapCache::failing())));
        assert!(cache.get_persistent(&key(1)).await.is_none());
    }

    #[tokio::test]
    async fn test_write_failure_is_absorbed() {
        let cache = TieredCache::new(4, Some(Arc::new(MapCache::failing())));
        // Must not panic or propagate; memory tier still written.
        cache.put(&key(1), frame(1), true).await;
        assert!(cache.get_memory(&key(1)).is_some());
    }

    #[tokio::test]
    async fn test_clear_drops_memory_only() {
        let tier2 = Arc::new(MapCache::new());
        let cache = TieredCache::new(4, Some(Arc::clone(&tier2) as Arc<dyn PersistentCache>));

        cache.put(&key(1), frame(1), true).await;
        cache.clear();

        assert!(cache.get_memory(&key(1)).is_none());
        assert!(tier2.contains(&key(1)));
    }
}

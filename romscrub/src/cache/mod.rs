//! Dual-tier preview cache.
//!
//! Tier 1 is a bounded in-process LRU ([`PreviewCache`]); tier 2 is an
//! optional, slower, cross-session store behind the [`PersistentCache`]
//! trait. Both tiers share one key space ([`CacheKey`]), so the same key
//! resolves in either. [`TieredCache`] wires the lookup chain together:
//! memory first, then persistent with promotion back into memory on a hit.
//!
//! Persistent-tier failures are absorbed as misses - a cache error must
//! never be worse than not having a cache.

mod disk;
mod memory;
mod persistent;
mod tiered;

pub use disk::{clear_disk_cache, disk_cache_stats, DiskCache, DiskClearResult};
pub use memory::PreviewCache;
pub use persistent::{PersistentCache, PersistentCacheError};
pub use tiered::TieredCache;

use std::fmt;

use crate::preview::SourceId;

/// Cache key derived deterministically from `(source, offset)`.
///
/// Stable across tiers: the memory tier hashes the struct directly, the
/// persistent tier uses [`CacheKey::storage_key`] as its string key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    source: SourceId,
    offset: u64,
}

impl CacheKey {
    /// Creates a key for an offset within a source.
    pub fn new(source: SourceId, offset: u64) -> Self {
        Self { source, offset }
    }

    /// Returns the source component.
    pub fn source(&self) -> &SourceId {
        &self.source
    }

    /// Returns the byte offset component.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Renders the stable string form used by persistent tiers.
    pub fn storage_key(&self) -> String {
        format!("{}:0x{:06X}", self.source, self.offset)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.storage_key())
    }
}

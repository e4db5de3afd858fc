//! Persistent-tier cache contract.
//!
//! Tier 2 is optional and external: the coordinator works through this
//! narrow get/put interface and never learns about the storage layout.
//! Absence or disablement of the tier must not change correctness, only
//! the hit rate - callers translate every error here into a miss.
//!
//! The trait uses `Pin<Box<dyn Future>>` for dyn compatibility
//! (`Arc<dyn PersistentCache>`).

use thiserror::Error;

use super::CacheKey;
use crate::preview::{BoxFuture, PreviewFrame};

/// Errors from a persistent-tier backend.
///
/// These never surface to the host; the tiered cache logs them and treats
/// the lookup as a miss.
#[derive(Debug, Error)]
pub enum PersistentCacheError {
    /// I/O failure reading or writing the store.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored record could not be decoded.
    #[error("corrupt cache record: {0}")]
    Codec(String),

    /// Backend-specific failure.
    #[error("persistent cache error: {0}")]
    Backend(String),
}

/// Slower, larger, optionally cross-session preview store; tier 2.
pub trait PersistentCache: Send + Sync {
    /// Looks up a frame by key.
    ///
    /// Returns `Ok(None)` when the key is not present.
    fn get<'a>(
        &'a self,
        key: &'a CacheKey,
    ) -> BoxFuture<'a, Result<Option<PreviewFrame>, PersistentCacheError>>;

    /// Stores a frame under the key.
    ///
    /// Returns `Ok(true)` when the frame was written. Only called on
    /// successful decode completion, never on promotion, to bound write
    /// volume.
    fn put<'a>(
        &'a self,
        key: &'a CacheKey,
        frame: &'a PreviewFrame,
    ) -> BoxFuture<'a, Result<bool, PersistentCacheError>>;

    /// Returns true when the tier is currently usable.
    ///
    /// A disabled tier is skipped entirely during lookup and write-back.
    fn is_enabled(&self) -> bool;
}

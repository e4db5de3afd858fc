//! Disk-backed persistent tier.
//!
//! One bincode-serialized record per key under a flat root directory.
//! Filenames are the sha256 of the storage key, which keeps arbitrary
//! source paths out of the filesystem namespace and makes collisions a
//! non-concern. All I/O goes through `tokio::fs` so lookups never block
//! a worker thread.
//!
//! The on-disk layout is an implementation detail: nothing outside this
//! module may assume anything about it beyond "a directory you can clear".

use std::fmt::Write as _;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use super::persistent::{PersistentCache, PersistentCacheError};
use super::CacheKey;
use crate::preview::{BoxFuture, PreviewFrame};

/// File extension for cache records.
const RECORD_EXT: &str = "preview";

/// Serialized form of a cached frame.
#[derive(Serialize, Deserialize)]
struct DiskRecord {
    data: Vec<u8>,
    width: u32,
    height: u32,
    label: String,
}

impl From<&PreviewFrame> for DiskRecord {
    fn from(frame: &PreviewFrame) -> Self {
        Self {
            data: frame.data.to_vec(),
            width: frame.width,
            height: frame.height,
            label: frame.label.clone(),
        }
    }
}

impl From<DiskRecord> for PreviewFrame {
    fn from(record: DiskRecord) -> Self {
        PreviewFrame::new(record.data, record.width, record.height, record.label)
    }
}

/// Persistent preview cache rooted at a directory.
pub struct DiskCache {
    root: PathBuf,
    enabled: bool,
}

impl DiskCache {
    /// Creates a disk cache rooted at `root`.
    ///
    /// The directory is created lazily on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            enabled: true,
        }
    }

    /// Enable or disable the tier without dropping it.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Returns the root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, key: &CacheKey) -> PathBuf {
        let digest = Sha256::digest(key.storage_key().as_bytes());
        let mut name = String::with_capacity(64 + RECORD_EXT.len() + 1);
        for byte in digest {
            let _ = write!(name, "{byte:02x}");
        }
        name.push('.');
        name.push_str(RECORD_EXT);
        self.root.join(name)
    }

    async fn read_record(&self, key: &CacheKey) -> Result<Option<PreviewFrame>, PersistentCacheError> {
        let path = self.record_path(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let record: DiskRecord = bincode::deserialize(&bytes)
            .map_err(|e| PersistentCacheError::Codec(e.to_string()))?;
        Ok(Some(record.into()))
    }

    async fn write_record(
        &self,
        key: &CacheKey,
        frame: &PreviewFrame,
    ) -> Result<bool, PersistentCacheError> {
        tokio::fs::create_dir_all(&self.root).await?;

        let record = DiskRecord::from(frame);
        let bytes = bincode::serialize(&record)
            .map_err(|e| PersistentCacheError::Codec(e.to_string()))?;

        let path = self.record_path(key);
        tokio::fs::write(&path, bytes).await?;
        debug!(key = %key, path = %path.display(), "wrote cache record");
        Ok(true)
    }
}

impl PersistentCache for DiskCache {
    fn get<'a>(
        &'a self,
        key: &'a CacheKey,
    ) -> BoxFuture<'a, Result<Option<PreviewFrame>, PersistentCacheError>> {
        Box::pin(self.read_record(key))
    }

    fn put<'a>(
        &'a self,
        key: &'a CacheKey,
        frame: &'a PreviewFrame,
    ) -> BoxFuture<'a, Result<bool, PersistentCacheError>> {
        Box::pin(self.write_record(key, frame))
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}

/// Result of clearing a disk cache directory.
#[derive(Debug, Clone, Default)]
pub struct DiskClearResult {
    /// Number of record files deleted.
    pub files_deleted: u64,
    /// Total bytes freed.
    pub bytes_freed: u64,
}

/// Returns `(record_count, total_bytes)` for a disk cache directory.
///
/// A missing directory counts as an empty cache.
pub fn disk_cache_stats(root: &Path) -> io::Result<(u64, u64)> {
    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok((0, 0)),
        Err(e) => return Err(e),
    };

    let mut files = 0u64;
    let mut bytes = 0u64;
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == RECORD_EXT) {
            files += 1;
            bytes += entry.metadata()?.len();
        }
    }
    Ok((files, bytes))
}

/// Deletes all cache records under a disk cache directory.
///
/// Files that are not cache records are left untouched.
pub fn clear_disk_cache(root: &Path) -> io::Result<DiskClearResult> {
    let mut result = DiskClearResult::default();
    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(result),
        Err(e) => return Err(e),
    };

    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == RECORD_EXT) {
            let size = entry.metadata()?.len();
            std::fs::remove_file(&path)?;
            result.files_deleted += 1;
            result.bytes_freed += size;
        }
    }
    Ok(result)
}

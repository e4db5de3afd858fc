//! Decoder contract and the raw-tile decoder.
//!
//! The coordinator treats decoders as opaque collaborators: given a source
//! identity and a byte offset they produce a [`PreviewFrame`] or fail.
//! Latency is decoder-specific (typically tens of milliseconds) and decoders
//! are not required to support interruption - cancellation is handled
//! downstream by discarding results.
//!
//! The trait uses `Pin<Box<dyn Future>>` for its async method so it stays
//! dyn-compatible (`Arc<dyn Decoder>`).

mod raw_tile;

pub use raw_tile::RawTileDecoder;

use thiserror::Error;

use crate::preview::{BoxFuture, PreviewFrame, SourceId};

/// Errors a decoder can produce.
///
/// All variants surface to the host as a preview error event; none of them
/// affect cache state or stop subsequent requests.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The source could not be read.
    #[error("failed to read source: {0}")]
    SourceRead(#[from] std::io::Error),

    /// The source is too small to contain decodable data.
    #[error("source too small: {size} bytes (min: {min})")]
    SourceTooSmall { size: usize, min: usize },

    /// The requested offset lies at or beyond the end of the source.
    #[error("offset {offset:#x} beyond source size {size:#x}")]
    OffsetOutOfRange { offset: u64, size: u64 },

    /// The bytes at the offset contain no complete tile.
    #[error("no complete tiles at offset {offset:#x}")]
    EmptyTileData { offset: u64 },

    /// Decoder-specific failure.
    #[error("{0}")]
    Other(String),
}

/// Turns `(source, offset)` into a decoded preview bitmap.
///
/// Implementations must be `Send + Sync`: decode calls run on worker tasks,
/// concurrently when the pool has more than one worker.
pub trait Decoder: Send + Sync {
    /// Decodes a preview at the given byte offset of the source.
    fn decode<'a>(
        &'a self,
        source: &'a SourceId,
        offset: u64,
    ) -> BoxFuture<'a, Result<PreviewFrame, DecodeError>>;
}

//! Raw 4bpp tile decoder for manual offset browsing.
//!
//! Manual scrubbing shows raw tiles, not parsed sprites: the decoder takes
//! a fixed window of bytes at the requested offset and interprets it as
//! 32-byte 4bpp tiles laid out 16 per row. That keeps per-step decode cost
//! flat regardless of what the bytes actually contain, which is what the
//! drag path needs.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;

use super::{DecodeError, Decoder};
use crate::preview::{BoxFuture, PreviewFrame, SourceId};

/// Bytes decoded per preview. 4 KiB keeps a single decode cheap enough to
/// run every debounce tick during a drag.
pub const PREVIEW_WINDOW_BYTES: usize = 4096;

/// Size of one 4bpp tile (8x8 pixels at 4 bits per pixel).
pub const TILE_BYTES: usize = 32;

/// Tiles laid out per preview row.
pub const TILES_PER_ROW: usize = 16;

/// Edge length of one tile in pixels.
const TILE_EDGE_PIXELS: usize = 8;

/// Preview bitmaps are capped at 128x128 pixels.
pub const MAX_PREVIEW_DIM: u32 = 128;

/// Minimum plausible source size. Anything smaller is rejected up front
/// rather than producing garbage previews for every offset.
pub const MIN_SOURCE_BYTES: usize = 0x8000;

/// Decoder that serves raw tile windows out of an in-memory source image.
///
/// The whole source is read once at construction; individual decodes are
/// then a bounds check plus a slice copy, so decode latency is dominated by
/// scheduling rather than I/O.
pub struct RawTileDecoder {
    data: Arc<Vec<u8>>,
}

impl RawTileDecoder {
    /// Opens a source file and loads it into memory.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DecodeError> {
        let data = std::fs::read(path)?;
        Self::from_bytes(data)
    }

    /// Wraps an already-loaded source image.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, DecodeError> {
        if data.len() < MIN_SOURCE_BYTES {
            return Err(DecodeError::SourceTooSmall {
                size: data.len(),
                min: MIN_SOURCE_BYTES,
            });
        }
        Ok(Self {
            data: Arc::new(data),
        })
    }

    /// Returns the source size in bytes.
    pub fn source_len(&self) -> usize {
        self.data.len()
    }

    fn decode_at(&self, offset: u64) -> Result<PreviewFrame, DecodeError> {
        let size = self.data.len() as u64;
        if offset >= size {
            return Err(DecodeError::OffsetOutOfRange { offset, size });
        }

        let start = offset as usize;
        let end = (start + PREVIEW_WINDOW_BYTES).min(self.data.len());
        let window = &self.data[start..end];

        let num_tiles = window.len() / TILE_BYTES;
        if num_tiles == 0 {
            return Err(DecodeError::EmptyTileData { offset });
        }

        let tile_rows = num_tiles.div_ceil(TILES_PER_ROW);
        let width = ((TILES_PER_ROW * TILE_EDGE_PIXELS) as u32).min(MAX_PREVIEW_DIM);
        let height = ((tile_rows * TILE_EDGE_PIXELS) as u32).min(MAX_PREVIEW_DIM);

        Ok(PreviewFrame::new(
            Bytes::copy_from_slice(window),
            width,
            height,
            format!("manual_0x{offset:06X}"),
        ))
    }
}

// The source image can be megabytes; report its size, not its contents.
impl fmt::Debug for RawTileDecoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawTileDecoder")
            .field("source_len", &self.data.len())
            .finish()
    }
}

impl Decoder for RawTileDecoder {
    fn decode<'a>(
        &'a self,
        _source: &'a SourceId,
        offset: u64,
    ) -> BoxFuture<'a, Result<PreviewFrame, DecodeError>> {
        let result = self.decode_at(offset);
        Box::pin(async move { result })
    }
}

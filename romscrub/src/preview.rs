//! Core data model shared across the preview subsystem.
//!
//! These types flow between the coordinator, the cache tiers, the decode
//! worker pool, and the host UI. Pixel payloads are held as [`bytes::Bytes`]
//! so a frame can sit in both cache tiers and travel over an event channel
//! without copying.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;

use crate::coordinator::DragState;

/// Boxed future type for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Identity of the binary resource being browsed (e.g. a ROM image path).
///
/// Cache keys derive from the source identity, so changing the active source
/// invalidates the memory tier - keys from the old source are meaningless
/// for the new one.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SourceId(String);

impl SourceId {
    /// Creates a source identity from a path-like string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identity as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SourceId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A decoded preview bitmap.
///
/// Produced by a [`Decoder`](crate::decoder::Decoder), stored in both cache
/// tiers, and delivered to the host via [`PreviewEvent`]. Cloning is cheap:
/// the pixel payload is reference-counted.
#[derive(Clone, Debug, PartialEq)]
pub struct PreviewFrame {
    /// Raw pixel bytes in decoder-defined format.
    pub data: Bytes,
    /// Bitmap width in pixels.
    pub width: u32,
    /// Bitmap height in pixels.
    pub height: u32,
    /// Human-readable label for the frame (e.g. `manual_0x200000`).
    pub label: String,
}

impl PreviewFrame {
    /// Creates a new preview frame.
    pub fn new(data: impl Into<Bytes>, width: u32, height: u32, label: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            width,
            height,
            label: label.into(),
        }
    }

    /// Returns the pixel payload size in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the frame carries no pixel data.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Monotonically increasing request identifier.
///
/// Allocated by the coordinator on every preview request. The coordinator
/// compares a completion's id against the latest issued id to detect and
/// discard stale results.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(u64);

impl RequestId {
    /// Creates a request id from a raw value.
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw id value.
    pub fn value(&self) -> u64 {
        self.0
    }

    /// Returns how many ids this one trails behind `latest`.
    ///
    /// Zero when this id is the latest (or newer, which only happens in
    /// tests that fabricate ids).
    pub fn lag_behind(&self, latest: RequestId) -> u64 {
        latest.0.saturating_sub(self.0)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Events delivered to the host over the coordinator's event channel.
///
/// The cached/generated distinction is preserved deliberately: hosts rely
/// on it for UI feedback timing (a `Cached` frame arrived with effectively
/// zero latency, a `Ready` frame went through the persistent tier or the
/// decoder).
#[derive(Clone, Debug)]
pub enum PreviewEvent {
    /// A frame served synchronously from the memory tier.
    Cached(PreviewFrame),
    /// A frame served from the persistent tier or freshly decoded.
    Ready(PreviewFrame),
    /// A decode failure; non-fatal, subsequent requests proceed normally.
    Error(String),
    /// The drag state machine changed state (for cursor/label feedback).
    DragStateChanged(DragState),
}

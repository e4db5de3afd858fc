//! Responsive preview pipeline for scrubbing through large binary images.
//!
//! `romscrub` keeps a live graphics preview in sync with an offset control
//! that a user drags across a ROM image. The pipeline absorbs bursty
//! interactive input, serves repeats from a dual-tier cache, and runs raw
//! tile decoding on a small fixed worker pool so the host UI never stalls.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          Host UI / CLI                       │
//! └──────────────┬───────────────────────────────▲───────────────┘
//!                │ offset + gesture commands     │ PreviewEvent
//! ┌──────────────▼───────────────────────────────┴───────────────┐
//! │  coordinator  (actor: debounce, drag state, staleness)       │
//! └───────┬──────────────────────────────────────▲───────────────┘
//!         │ miss                                 │ outcomes
//! ┌───────▼───────────────┐            ┌─────────┴───────────────┐
//! │  cache                │            │  pool                   │
//! │  memory (LRU) ─► disk │            │  bounded decode workers │
//! └───────────────────────┘            └─────────┬───────────────┘
//!                                      ┌─────────▼───────────────┐
//!                                      │  decoder (raw 4bpp tile)│
//!                                      └─────────────────────────┘
//! ```
//!
//! # Quick start
//!
//! ```ignore
//! use romscrub::config::PreviewConfig;
//! use romscrub::coordinator::PreviewCoordinator;
//! use romscrub::decoder::RawTileDecoder;
//! use romscrub::preview::SourceId;
//! use std::sync::Arc;
//!
//! let decoder = Arc::new(RawTileDecoder::open("game.smc")?);
//! let (coordinator, mut events) = PreviewCoordinator::spawn(
//!     PreviewConfig::default(),
//!     SourceId::new("game.smc"),
//!     decoder,
//!     None,
//! );
//!
//! coordinator.request_preview(0x200000);
//! let event = events.recv().await;
//! ```

pub mod cache;
pub mod config;
pub mod coordinator;
pub mod decoder;
pub mod metrics;
pub mod pool;
pub mod preview;

pub use cache::{CacheKey, DiskCache, PersistentCache, PreviewCache, TieredCache};
pub use config::PreviewConfig;
pub use coordinator::{DragState, PreviewCoordinator};
pub use decoder::{DecodeError, Decoder, RawTileDecoder};
pub use metrics::{MetricsSnapshot, PreviewMetrics};
pub use preview::{PreviewEvent, PreviewFrame, RequestId, SourceId};

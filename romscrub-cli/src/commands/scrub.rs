//! Simulated scrub session against a ROM image.
//!
//! Drives the coordinator the way an interactive offset slider would:
//! press, a series of drag positions at a fixed interval, release, then
//! wait out the settle window. Events are printed as they arrive and a
//! metrics summary closes the session.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use romscrub::cache::{DiskCache, PersistentCache};
use romscrub::config::{PreviewConfig, DEFAULT_POOL_SIZE};
use romscrub::coordinator::PreviewCoordinator;
use romscrub::decoder::{Decoder, RawTileDecoder};
use romscrub::preview::{PreviewEvent, SourceId};
use tracing::info;

use crate::error::CliError;

/// Arguments for the `scrub` command.
#[derive(Debug, Args)]
pub struct ScrubArgs {
    /// Path to the ROM image
    pub rom: PathBuf,

    /// First offset of the scrub range (decimal or 0x-prefixed hex)
    #[arg(long, default_value = "0x8000", value_parser = parse_offset)]
    pub start: u64,

    /// Last offset of the scrub range
    #[arg(long, default_value = "0x20000", value_parser = parse_offset)]
    pub end: u64,

    /// Step between simulated drag positions
    #[arg(long, default_value = "0x1000", value_parser = parse_offset)]
    pub step: u64,

    /// Delay between simulated drag positions, in milliseconds
    #[arg(long, default_value_t = 30)]
    pub interval_ms: u64,

    /// Number of decode workers
    #[arg(long, default_value_t = DEFAULT_POOL_SIZE)]
    pub workers: usize,

    /// Disable the persistent disk tier for this session
    #[arg(long)]
    pub no_disk_cache: bool,
}

/// Run a simulated scrub session.
pub fn run(args: ScrubArgs, cache_dir: PathBuf) -> Result<(), CliError> {
    let runtime =
        tokio::runtime::Runtime::new().map_err(|e| CliError::Runtime(e.to_string()))?;
    runtime.block_on(run_session(args, cache_dir))
}

async fn run_session(args: ScrubArgs, cache_dir: PathBuf) -> Result<(), CliError> {
    let decoder =
        RawTileDecoder::open(&args.rom).map_err(|e| CliError::RomOpen(e.to_string()))?;
    info!(
        rom = %args.rom.display(),
        size = decoder.source_len(),
        "opened ROM image"
    );

    let persistent: Option<Arc<dyn PersistentCache>> = if args.no_disk_cache {
        None
    } else {
        Some(Arc::new(DiskCache::new(cache_dir)))
    };

    let config = PreviewConfig::default().with_pool_size(args.workers);
    let settle_wait = config.settle_debounce + config.settle_timeout + Duration::from_millis(200);
    let source = SourceId::new(args.rom.to_string_lossy());
    let (coordinator, mut events) =
        PreviewCoordinator::spawn(config, source, Arc::new(decoder) as Arc<dyn Decoder>, persistent);
    let metrics = coordinator.metrics();

    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                PreviewEvent::Cached(frame) => {
                    println!("cached  {}  {}x{}", frame.label, frame.width, frame.height);
                }
                PreviewEvent::Ready(frame) => {
                    println!("ready   {}  {}x{}", frame.label, frame.width, frame.height);
                }
                PreviewEvent::Error(message) => {
                    println!("error   {message}");
                }
                PreviewEvent::DragStateChanged(state) => {
                    println!("state   {state}");
                }
            }
        }
    });

    let step = args.step.max(1);
    let interval = Duration::from_millis(args.interval_ms);

    coordinator.press_start();
    let mut offset = args.start;
    while offset <= args.end {
        coordinator.request_preview(offset);
        tokio::time::sleep(interval).await;
        offset += step;
    }
    coordinator.release_end();

    // Let the settle pass and the idle transition play out.
    tokio::time::sleep(settle_wait).await;

    println!();
    print!("{}", metrics.snapshot());

    coordinator.shutdown();
    coordinator.join().await;
    let _ = printer.await;
    Ok(())
}

/// Parses a decimal or `0x`-prefixed hexadecimal offset.
pub fn parse_offset(value: &str) -> Result<u64, String> {
    let value = value.trim();
    let parsed = if let Some(hex) = value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16)
    } else {
        value.parse()
    };
    parsed.map_err(|_| CliError::InvalidOffset(value.to_string()).to_string())
}

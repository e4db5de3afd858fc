//! CLI error types.

use thiserror::Error;

/// Errors surfaced to the user by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// The ROM image could not be opened or read.
    #[error("failed to open ROM image: {0}")]
    RomOpen(String),

    /// An offset argument could not be parsed.
    #[error("invalid offset '{0}': expected a decimal or 0x-prefixed hex value")]
    InvalidOffset(String),

    /// Clearing the disk cache failed.
    #[error("failed to clear cache: {0}")]
    CacheClear(String),

    /// Reading disk cache statistics failed.
    #[error("failed to read cache stats: {0}")]
    CacheStats(String),

    /// The tokio runtime could not be created.
    #[error("failed to start async runtime: {0}")]
    Runtime(String),
}

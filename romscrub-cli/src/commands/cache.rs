//! Cache management CLI commands.

use std::path::PathBuf;

use clap::Subcommand;
use romscrub::cache::{clear_disk_cache, disk_cache_stats};
use romscrub::config::format_size;

use crate::error::CliError;

/// Cache action subcommands.
#[derive(Debug, Subcommand)]
pub enum CacheAction {
    /// Clear the disk cache, removing all cached previews
    Clear,
    /// Show disk cache statistics
    Stats,
}

/// Run a cache subcommand against a cache directory.
pub fn run(action: CacheAction, cache_dir: PathBuf) -> Result<(), CliError> {
    match action {
        CacheAction::Clear => {
            println!("Clearing preview cache at: {}", cache_dir.display());

            match clear_disk_cache(&cache_dir) {
                Ok(result) => {
                    println!(
                        "Deleted {} files, freed {}",
                        result.files_deleted,
                        format_size(result.bytes_freed as usize)
                    );
                    Ok(())
                }
                Err(e) => Err(CliError::CacheClear(e.to_string())),
            }
        }
        CacheAction::Stats => {
            println!("Preview cache: {}", cache_dir.display());

            match disk_cache_stats(&cache_dir) {
                Ok((files, bytes)) => {
                    println!("  Files: {}", files);
                    println!("  Size:  {}", format_size(bytes as usize));
                    Ok(())
                }
                Err(e) => Err(CliError::CacheStats(e.to_string())),
            }
        }
    }
}

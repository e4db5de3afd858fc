//! romscrub - smooth byte-offset preview scrubbing for ROM images.

mod commands;
mod error;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::cache::CacheAction;
use commands::scrub::ScrubArgs;

#[derive(Parser)]
#[command(
    name = "romscrub",
    version,
    about = "Smooth byte-offset preview scrubbing for ROM images"
)]
struct Cli {
    /// Directory for the persistent preview cache
    #[arg(long, global = true, default_value = ".romscrub-cache")]
    cache_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a simulated scrub session against a ROM image
    Scrub(ScrubArgs),
    /// Manage the persistent preview cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Scrub(args) => commands::scrub::run(args, cli.cache_dir),
        Commands::Cache { action } => commands::cache::run(action, cli.cache_dir),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

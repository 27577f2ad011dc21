use super::app_config::LogLevel;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "pixload",
    version,
    about = "Load images through a memory and storage cache",
    long_about = None
)]
pub struct CliArgs {
    /// Configuration file path.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log file path.
    #[arg(long, value_name = "PATH")]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Storage cache directory.
    #[arg(long, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Storage cache budget in bytes.
    #[arg(long, value_name = "BYTES")]
    pub storage_max_bytes: Option<u64>,

    /// Number of concurrent load workers.
    #[arg(long)]
    pub workers: Option<usize>,

    /// Disable the storage cache.
    #[arg(long)]
    pub no_storage: bool,

    /// Directory resource names resolve against.
    #[arg(long, value_name = "DIR")]
    pub resource_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Load an image through the caches and save it.
    Fetch {
        /// URI, file path, or `res:<name>`.
        source: String,

        /// Required width; needs --height.
        #[arg(long, requires = "height")]
        width: Option<u32>,

        /// Required height; needs --width.
        #[arg(long, requires = "width")]
        height: Option<u32>,

        /// Convert to grayscale.
        #[arg(long)]
        grayscale: bool,

        /// Gaussian blur sigma.
        #[arg(long)]
        blur: Option<f32>,

        /// Output file; the format follows the extension.
        #[arg(short, long, value_name = "PATH")]
        output: PathBuf,
    },

    /// Drop every cached variant of a source.
    Invalidate {
        /// URI, file path, or `res:<name>`.
        source: String,
    },

    /// Empty both caches.
    Clear,

    /// Print storage cache statistics.
    Stats,
}

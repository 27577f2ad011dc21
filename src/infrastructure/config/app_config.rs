//! Loader configuration.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::args::CliArgs;
use crate::domain::entities::StoragePolicy;
use crate::infrastructure::image::codec::{CompressFormat, DEFAULT_JPEG_QUALITY};
use crate::infrastructure::image::loaders::DEFAULT_MAX_BODY_BYTES;
use crate::infrastructure::image::memory_cache::{DEFAULT_BUDGET_FRACTION, DEFAULT_MEMORY_BUDGET};
use crate::infrastructure::image::storage_cache::{DEFAULT_MAX_CACHE_SIZE, default_cache_dir};

const APP_NAME: &str = "pixload";
const APP_QUALIFIER: &str = "com";
const APP_ORGANIZATION: &str = "linuxmobile";

/// Upper bound on default load workers.
const MAX_DEFAULT_WORKERS: usize = 4;

/// Log level configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trace => write!(f, "trace"),
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Loader configuration, read from `config.toml` and CLI flags.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Configuration file path.
    #[serde(skip)]
    pub config: Option<PathBuf>,

    /// Log file path.
    #[serde(skip)]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Memory cache configuration.
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Storage cache configuration.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Worker pool configuration.
    #[serde(default)]
    pub workers: WorkerConfig,

    /// HTTP configuration.
    #[serde(default)]
    pub network: NetworkConfig,

    /// Directory that resource names resolve against.
    /// Resource requests are unsupported when unset.
    #[serde(default)]
    pub resource_dir: Option<PathBuf>,
}

/// Memory cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Explicit capacity in bytes; overrides the budget fraction.
    #[serde(default)]
    pub capacity_bytes: Option<usize>,

    /// Memory budget the cache takes a fraction of.
    #[serde(default = "default_memory_budget")]
    pub budget_bytes: usize,

    /// Fraction of the budget given to the cache.
    #[serde(default = "default_budget_fraction")]
    pub budget_fraction: f64,
}

impl MemoryConfig {
    /// Returns the effective capacity in bytes.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn capacity(&self) -> usize {
        self.capacity_bytes.unwrap_or_else(|| {
            (self.budget_bytes as f64 * self.budget_fraction.clamp(0.0, 1.0)) as usize
        })
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            capacity_bytes: None,
            budget_bytes: default_memory_budget(),
            budget_fraction: default_budget_fraction(),
        }
    }
}

/// File format of storage cache entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageFormat {
    /// Lossless.
    #[default]
    Png,
    /// Lossy.
    Jpeg,
}

/// Storage cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Enable the storage cache.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Cache directory; defaults to the platform cache dir.
    #[serde(default)]
    pub directory: Option<PathBuf>,

    /// Byte budget.
    #[serde(default = "default_storage_size")]
    pub max_size_bytes: u64,

    /// File format.
    #[serde(default)]
    pub format: StorageFormat,

    /// JPEG quality (1-100) when `format = "jpeg"`.
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,

    /// Which fresh results get written.
    #[serde(default)]
    pub policy: StoragePolicy,
}

impl StorageConfig {
    /// Returns the encoder settings.
    #[must_use]
    pub const fn compress_format(&self) -> CompressFormat {
        match self.format {
            StorageFormat::Png => CompressFormat::Png,
            StorageFormat::Jpeg => CompressFormat::Jpeg(self.jpeg_quality),
        }
    }

    /// Returns the effective cache directory.
    #[must_use]
    pub fn effective_directory(&self) -> PathBuf {
        self.directory.clone().unwrap_or_else(default_cache_dir)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: None,
            max_size_bytes: default_storage_size(),
            format: StorageFormat::default(),
            jpeg_quality: default_jpeg_quality(),
            policy: StoragePolicy::default(),
        }
    }
}

/// Worker pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Concurrent load actions.
    #[serde(default = "default_load_workers")]
    pub load_workers: usize,

    /// Concurrent storage cache writes.
    #[serde(default = "default_cache_writers")]
    pub cache_writers: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            load_workers: default_load_workers(),
            cache_writers: default_cache_writers(),
        }
    }
}

/// HTTP configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Largest accepted response body.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: u64,
}

impl NetworkConfig {
    /// Returns the request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_memory_budget() -> usize {
    DEFAULT_MEMORY_BUDGET
}

fn default_budget_fraction() -> f64 {
    DEFAULT_BUDGET_FRACTION
}

fn default_storage_size() -> u64 {
    DEFAULT_MAX_CACHE_SIZE
}

fn default_jpeg_quality() -> u8 {
    DEFAULT_JPEG_QUALITY
}

fn default_load_workers() -> usize {
    std::thread::available_parallelism()
        .map_or(1, std::num::NonZeroUsize::get)
        .min(MAX_DEFAULT_WORKERS)
}

fn default_cache_writers() -> usize {
    1
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_body_bytes() -> u64 {
    DEFAULT_MAX_BODY_BYTES
}


impl LoaderConfig {
    /// Merges CLI arguments into the configuration.
    pub fn merge_with_args(&mut self, args: &CliArgs) {
        if let Some(config_path) = &args.config {
            self.config = Some(config_path.clone());
        }
        if let Some(log_path) = &args.log_path {
            self.log_path = Some(log_path.clone());
        }
        if let Some(log_level) = args.log_level {
            self.log_level = log_level;
        }
        if let Some(cache_dir) = &args.cache_dir {
            self.storage.directory = Some(cache_dir.clone());
        }
        if let Some(max_size) = args.storage_max_bytes {
            self.storage.max_size_bytes = max_size;
        }
        if let Some(workers) = args.workers {
            self.workers.load_workers = workers;
        }
        if args.no_storage {
            self.storage.enabled = false;
        }
        if let Some(resource_dir) = &args.resource_dir {
            self.resource_dir = Some(resource_dir.clone());
        }
    }

    /// Returns default config directory.
    #[must_use]
    pub fn default_config_dir() -> Option<PathBuf> {
        ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Returns default log file path.
    #[must_use]
    pub fn default_log_path() -> Option<PathBuf> {
        ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .map(|dirs| dirs.data_dir().join("pixload.log"))
    }

    /// Returns effective log path.
    #[must_use]
    pub fn effective_log_path(&self) -> Option<PathBuf> {
        self.log_path.clone().or_else(Self::default_log_path)
    }
}

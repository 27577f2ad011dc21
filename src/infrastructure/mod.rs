//! Infrastructure layer with cache, loader and configuration adapters.

/// Loader configuration.
pub mod config;
/// Image handling (caching, decoding, loading, transformations).
pub mod image;

pub use config::{CliArgs, ConfigStore, LoaderConfig, LogLevel};
pub use self::image::{
    CacheStats, CompressFormat, HashedDescriptors, MemoryImageCache, StorageImageCache,
    StorageStats,
};

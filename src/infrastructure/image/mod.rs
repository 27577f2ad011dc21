//! Image handling infrastructure.
//!
//! This module provides:
//! - Memory caching with byte-bounded LRU eviction
//! - Storage caching with coalesced background eviction
//! - Decoding and encoding helpers
//! - Built-in loaders, descriptor factory and transformations

pub mod codec;
pub mod descriptors;
pub mod loaders;
pub mod memory_cache;
pub mod storage_cache;
pub mod transforms;

pub use codec::CompressFormat;
pub use descriptors::HashedDescriptors;
pub use loaders::{BytesLoader, FetchError, FileLoader, ResourceLoader, UriLoader};
pub use memory_cache::{CacheStats, MemoryImageCache};
pub use storage_cache::{StorageImageCache, StorageStats};
pub use transforms::{Blur, Grayscale, Resize, TransformChain};

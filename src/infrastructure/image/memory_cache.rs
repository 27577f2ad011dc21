//! In-memory LRU image cache bounded by decoded byte size.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use lru::LruCache;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::domain::entities::image_byte_size;
use crate::domain::ports::MemoryCachePort;

/// Default memory budget the cache takes a fraction of (256 MiB).
pub const DEFAULT_MEMORY_BUDGET: usize = 256 * 1024 * 1024;

/// Default fraction of the budget given to the cache.
pub const DEFAULT_BUDGET_FRACTION: f64 = 0.25;

struct Entry {
    image: Arc<image::DynamicImage>,
    size: usize,
}

struct Inner {
    entries: LruCache<String, Entry>,
    size: usize,
}

/// In-memory LRU cache for decoded images.
/// Thread-safe; every operation holds one short lock.
pub struct MemoryImageCache {
    inner: Mutex<Inner>,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MemoryImageCache {
    /// Creates a cache holding at most `capacity` bytes of decoded pixels.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: LruCache::unbounded(),
                size: 0,
            }),
            capacity,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Creates a cache sized as a fraction of a memory budget.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn with_budget(budget: usize, fraction: f64) -> Self {
        let fraction = fraction.clamp(0.0, 1.0);
        Self::new((budget as f64 * fraction) as usize)
    }

    /// Returns the configured capacity in bytes.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the bytes currently held.
    #[must_use]
    pub fn size(&self) -> usize {
        self.inner.lock().size
    }

    /// Peeks at an image without promoting it in the LRU.
    #[must_use]
    pub fn peek(&self, key: &str) -> Option<Arc<image::DynamicImage>> {
        self.inner.lock().entries.peek(key).map(|e| e.image.clone())
    }

    /// Returns cache statistics.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 {
            (hits as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        let inner = self.inner.lock();
        CacheStats {
            hits,
            misses,
            hit_rate,
            entries: inner.entries.len(),
            bytes: inner.size,
            capacity: self.capacity,
        }
    }
}

impl Default for MemoryImageCache {
    fn default() -> Self {
        Self::with_budget(DEFAULT_MEMORY_BUDGET, DEFAULT_BUDGET_FRACTION)
    }
}

/// Statistics about cache performance.
#[derive(Debug, Clone)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Hit rate as a percentage.
    pub hit_rate: f64,
    /// Current number of cached images.
    pub entries: usize,
    /// Bytes currently held.
    pub bytes: usize,
    /// Capacity in bytes.
    pub capacity: usize,
}

impl std::fmt::Display for CacheStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Memory cache: {} images, {}/{} bytes, {:.1}% hit rate ({} hits, {} misses)",
            self.entries, self.bytes, self.capacity, self.hit_rate, self.hits, self.misses
        )
    }
}

impl MemoryCachePort for MemoryImageCache {
    fn get(&self, key: &str) -> Option<Arc<image::DynamicImage>> {
        let mut inner = self.inner.lock();
        if let Some(entry) = inner.entries.get(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            trace!(key = %key, "Memory cache hit");
            Some(entry.image.clone())
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            trace!(key = %key, "Memory cache miss");
            None
        }
    }

    fn put(&self, key: &str, image: Arc<image::DynamicImage>) {
        let size = image_byte_size(&image);
        let mut inner = self.inner.lock();

        if let Some(old) = inner.entries.pop(key) {
            inner.size -= old.size;
        }

        if size > self.capacity {
            debug!(key = %key, size, capacity = self.capacity, "Image larger than memory cache, not stored");
            return;
        }

        inner.entries.put(key.to_string(), Entry { image, size });
        inner.size += size;
        trace!(key = %key, size, "Stored image in memory cache");

        while inner.size > self.capacity {
            let Some((evicted, entry)) = inner.entries.pop_lru() else {
                break;
            };
            inner.size -= entry.size;
            debug!(key = %evicted, size = entry.size, "Evicted image from memory cache");
        }
    }

    fn remove(&self, prefix: &str) -> usize {
        let mut inner = self.inner.lock();
        let doomed: Vec<String> = inner
            .entries
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &doomed {
            if let Some(entry) = inner.entries.pop(key) {
                inner.size -= entry.size;
            }
        }

        if !doomed.is_empty() {
            debug!(prefix = %prefix, count = doomed.len(), "Removed images from memory cache");
        }
        doomed.len()
    }

    fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.size = 0;
        debug!("Cleared memory image cache");
    }

    fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }
}

//! Port definitions for the two cache tiers.

use std::sync::Arc;

/// In-memory cache of decoded images.
///
/// Called from workers and from the UI thread; implementations must not
/// block beyond a short lock hold.
pub trait MemoryCachePort: Send + Sync {
    /// Returns the image stored under `key`, marking it recently used.
    fn get(&self, key: &str) -> Option<Arc<image::DynamicImage>>;

    /// Stores an image, evicting least recently used entries if needed.
    fn put(&self, key: &str, image: Arc<image::DynamicImage>);

    /// Removes every entry whose key starts with `prefix`.
    /// Returns the number of entries removed.
    fn remove(&self, prefix: &str) -> usize;

    /// Removes all entries.
    fn clear(&self);

    /// Returns the number of cached images.
    fn len(&self) -> usize;

    /// Returns true if the cache is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Persistent cache of encoded images.
///
/// Failures are never reported: reads degrade to a miss, writes to a no-op.
#[async_trait::async_trait]
pub trait StorageCachePort: Send + Sync {
    /// Decodes the image stored under `key` and refreshes its recency.
    async fn get(&self, key: &str) -> Option<Arc<image::DynamicImage>>;

    /// Encodes and stores an image, then schedules a fit pass.
    async fn put(&self, key: &str, image: Arc<image::DynamicImage>);

    /// Removes every entry whose key starts with `prefix`.
    /// Returns the number of entries removed.
    async fn remove(&self, prefix: &str) -> usize;

    /// Removes all entries.
    async fn clear(&self);

    /// Returns the number of stored images.
    async fn len(&self) -> usize;
}

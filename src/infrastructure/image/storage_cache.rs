//! Disk-based image cache bounded by total file size.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::SystemTime;

use parking_lot::Mutex;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Notify;
use tracing::{debug, error, trace, warn};

use super::codec::{self, CompressFormat};
use crate::domain::entities::CacheKey;
use crate::domain::errors::{CacheError, CacheResult};
use crate::domain::ports::StorageCachePort;

/// Maximum storage cache size in bytes (200 MB default).
pub const DEFAULT_MAX_CACHE_SIZE: u64 = 200 * 1024 * 1024;

const CACHE_EXT: &str = "img";
const TEMP_EXT: &str = "tmp";
/// Sidecar holding the full key of a shortened file name.
const KEY_EXT: &str = "key";

/// Escaped keys this long or longer get a shortened, hashed file name.
const MAX_PLAIN_STEM: usize = 200;
/// Escaped key bytes kept at the front of a shortened file name.
const HEAD_LEN: usize = 150;
const HASH_SEP: char = '~';

/// Disk-based image cache, one encoded file per key.
///
/// Cloning is cheap and clones share the same directory state.
#[derive(Clone)]
pub struct StorageImageCache {
    inner: Arc<Inner>,
}

struct Inner {
    cache_dir: PathBuf,
    max_size: u64,
    format: CompressFormat,
    io_lock: tokio::sync::Mutex<()>,
    current_size: AtomicU64,
    item_count: AtomicUsize,
    fit: Mutex<FitState>,
    fit_idle: Notify,
    sweeps: AtomicU64,
    active_sweeps: AtomicUsize,
    peak_sweeps: AtomicUsize,
}

#[derive(Debug, Default)]
struct FitState {
    running: bool,
    rerun: bool,
}

impl StorageImageCache {
    /// Opens (or creates) a cache in the specified directory.
    ///
    /// Existing files are counted and a fit pass is scheduled.
    ///
    /// # Errors
    /// Returns error if cache directory cannot be created or read.
    pub async fn new(cache_dir: PathBuf, max_size: u64, format: CompressFormat) -> CacheResult<Self> {
        fs::create_dir_all(&cache_dir)
            .await
            .map_err(|e| CacheError::IoError(format!("Failed to create cache dir: {e}")))?;

        let mut total_size = 0u64;
        let mut count = 0usize;

        let mut entries = fs::read_dir(&cache_dir)
            .await
            .map_err(|e| CacheError::IoError(format!("Failed to read cache dir: {e}")))?;

        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if has_ext(&path, TEMP_EXT) {
                let _ = fs::remove_file(&path).await;
            } else if has_ext(&path, KEY_EXT) {
                if !fs::try_exists(path.with_extension(CACHE_EXT)).await.unwrap_or(false) {
                    let _ = fs::remove_file(&path).await;
                }
            } else if has_ext(&path, CACHE_EXT)
                && let Ok(meta) = entry.metadata().await
            {
                total_size += meta.len();
                count += 1;
            }
        }

        debug!(dir = %cache_dir.display(), size = total_size, count, "Opened storage cache");

        let cache = Self {
            inner: Arc::new(Inner {
                cache_dir,
                max_size,
                format,
                io_lock: tokio::sync::Mutex::new(()),
                current_size: AtomicU64::new(total_size),
                item_count: AtomicUsize::new(count),
                fit: Mutex::new(FitState::default()),
                fit_idle: Notify::new(),
                sweeps: AtomicU64::new(0),
                active_sweeps: AtomicUsize::new(0),
                peak_sweeps: AtomicUsize::new(0),
            }),
        };

        cache.request_fit();

        Ok(cache)
    }

    /// Opens a cache in the default location (~/.cache/pixload/images/).
    ///
    /// # Errors
    /// Returns error if cache directory cannot be created.
    pub async fn default_location(format: CompressFormat) -> CacheResult<Self> {
        Self::new(default_cache_dir(), DEFAULT_MAX_CACHE_SIZE, format).await
    }

    /// Returns the cache directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.inner.cache_dir
    }

    /// Returns the byte budget.
    #[must_use]
    pub fn max_size(&self) -> u64 {
        self.inner.max_size
    }

    /// Returns the path for a cached key.
    fn cache_path(&self, key: &str) -> PathBuf {
        self.inner.path_for(key)
    }

    /// Gets raw encoded bytes and refreshes the file's recency.
    pub async fn get_bytes(&self, key: &str) -> Option<Vec<u8>> {
        let path = self.cache_path(key);
        let _guard = self.inner.io_lock.lock().await;
        match fs::read(&path).await {
            Ok(bytes) => {
                trace!(key = %key, path = %path.display(), "Storage cache hit");
                touch(path).await;
                Some(bytes)
            }
            Err(_) => {
                trace!(key = %key, "Storage cache miss");
                None
            }
        }
    }

    /// Checks if a key is stored.
    pub async fn contains(&self, key: &str) -> bool {
        fs::try_exists(self.cache_path(key)).await.unwrap_or(false)
    }

    /// Returns the tracked size in bytes.
    #[must_use]
    pub fn current_size(&self) -> u64 {
        self.inner.current_size.load(Ordering::Relaxed)
    }

    /// Returns cache statistics.
    #[must_use]
    pub fn stats(&self) -> StorageStats {
        StorageStats {
            bytes: self.current_size(),
            entries: self.inner.item_count.load(Ordering::Relaxed),
            max_bytes: self.inner.max_size,
            sweeps: self.inner.sweeps.load(Ordering::Relaxed),
            peak_concurrent_sweeps: self.inner.peak_sweeps.load(Ordering::SeqCst),
        }
    }

    /// Schedules a fit pass, or flags the running one to loop again.
    fn request_fit(&self) {
        {
            let mut fit = self.inner.fit.lock();
            if fit.running {
                fit.rerun = true;
                trace!("Fit pass already running, coalescing");
                return;
            }
            fit.running = true;
        }

        let inner = self.inner.clone();
        tokio::spawn(async move {
            inner.run_fit().await;
        });
    }

    /// Waits until no fit pass is running or pending.
    pub async fn wait_for_fit(&self) {
        loop {
            let notified = self.inner.fit_idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if !self.inner.fit.lock().running {
                return;
            }
            notified.await;
        }
    }
}

impl Inner {
    fn path_for(&self, key: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.{CACHE_EXT}", stem_for(key)))
    }

    async fn run_fit(&self) {
        loop {
            self.sweep().await;

            let rerun = {
                let mut fit = self.fit.lock();
                if fit.rerun {
                    fit.rerun = false;
                    true
                } else {
                    fit.running = false;
                    false
                }
            };
            if !rerun {
                self.fit_idle.notify_waiters();
                return;
            }
        }
    }

    async fn sweep(&self) {
        let active = self.active_sweeps.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_sweeps.fetch_max(active, Ordering::SeqCst);
        self.sweeps.fetch_add(1, Ordering::Relaxed);

        {
            let _guard = self.io_lock.lock().await;
            self.evict_to_budget().await;
        }

        self.active_sweeps.fetch_sub(1, Ordering::SeqCst);
    }

    /// Keeps the most recently touched files that fit in the budget.
    async fn evict_to_budget(&self) {
        let current_size = self.current_size.load(Ordering::Relaxed);
        if current_size <= self.max_size {
            return;
        }

        debug!(
            current_size = current_size,
            max_size = self.max_size,
            "Storage cache over limit, cleaning up"
        );

        let mut files = self.list_files().await;
        files.sort_by(|a, b| b.1.cmp(&a.1));

        let mut kept_size = 0u64;
        let mut kept_count = 0usize;
        let mut freed_size = 0u64;
        let mut freed_count = 0usize;
        let mut over_budget = false;

        for (path, _, size) in files {
            if !over_budget && kept_size + size <= self.max_size {
                kept_size += size;
                kept_count += 1;
                continue;
            }
            over_budget = true;

            if let Err(e) = remove_entry(&path).await {
                warn!(path = %path.display(), error = %e, "Failed to remove old cache file");
                kept_size += size;
                kept_count += 1;
            } else {
                trace!(path = %path.display(), "Removed old cache file");
                freed_size += size;
                freed_count += 1;
            }
        }

        self.current_size.store(kept_size, Ordering::Relaxed);
        self.item_count.store(kept_count, Ordering::Relaxed);

        debug!(
            freed_size = freed_size,
            freed_count = freed_count,
            "Storage cache cleanup complete"
        );
    }

    async fn list_files(&self) -> Vec<(PathBuf, SystemTime, u64)> {
        let mut files = Vec::new();
        let Ok(mut entries) = fs::read_dir(&self.cache_dir).await else {
            return files;
        };

        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if !has_ext(&path, CACHE_EXT) {
                continue;
            }
            if let Ok(meta) = entry.metadata().await {
                let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
                files.push((path, modified, meta.len()));
            }
        }
        files
    }

    async fn write_atomic(&self, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
        let temp = path.with_extension(format!("{CACHE_EXT}.{TEMP_EXT}"));
        let mut file = fs::File::create(&temp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);
        if let Err(e) = fs::rename(&temp, path).await {
            let _ = fs::remove_file(&temp).await;
            return Err(e);
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl StorageCachePort for StorageImageCache {
    async fn get(&self, key: &str) -> Option<Arc<image::DynamicImage>> {
        let bytes = self.get_bytes(key).await?;

        let result = tokio::task::spawn_blocking(move || decode_entry(&bytes)).await;

        match result {
            Ok(Ok(img)) => {
                debug!(key = %key, "Decoded image from storage cache");
                Some(Arc::new(img))
            }
            Ok(Err(e)) => {
                warn!(key = %key, error = %e, "Failed to decode cached image");
                None
            }
            Err(e) => {
                error!(key = %key, error = %e, "Decode task panicked");
                None
            }
        }
    }

    async fn put(&self, key: &str, image: Arc<image::DynamicImage>) {
        let format = self.inner.format;
        let encoded = tokio::task::spawn_blocking(move || encode_entry(&image, format)).await;
        let bytes = match encoded {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(e)) => {
                warn!(key = %key, error = %e, "Failed to encode image for storage");
                return;
            }
            Err(e) => {
                error!(key = %key, error = %e, "Encode task panicked");
                return;
            }
        };

        let path = self.cache_path(key);
        {
            let _guard = self.inner.io_lock.lock().await;
            let old_size = fs::metadata(&path).await.map(|m| m.len()).ok();

            if is_shortened(&path)
                && let Err(e) = fs::write(path.with_extension(KEY_EXT), key).await
            {
                warn!(key = %key, error = %e, "Failed to write storage cache key file");
                return;
            }
            if let Err(e) = self.inner.write_atomic(&path, &bytes).await {
                warn!(key = %key, error = %e, "Failed to write storage cache file");
                return;
            }

            let new_size = bytes.len() as u64;
            if let Some(old) = old_size {
                if new_size > old {
                    self.inner
                        .current_size
                        .fetch_add(new_size - old, Ordering::Relaxed);
                } else {
                    self.inner
                        .current_size
                        .fetch_sub(old - new_size, Ordering::Relaxed);
                }
            } else {
                self.inner.current_size.fetch_add(new_size, Ordering::Relaxed);
                self.inner.item_count.fetch_add(1, Ordering::Relaxed);
            }

            debug!(key = %key, path = %path.display(), size = bytes.len(), "Stored image in storage cache");
        }

        self.request_fit();
    }

    async fn remove(&self, prefix: &str) -> usize {
        let escaped = escape_key(prefix);
        let _guard = self.inner.io_lock.lock().await;

        let mut removed = 0usize;
        for (path, _, size) in self.inner.list_files().await {
            if !stores_prefix(&path, prefix, &escaped).await {
                continue;
            }

            match remove_entry(&path).await {
                Ok(()) => {
                    self.inner.current_size.fetch_sub(size, Ordering::Relaxed);
                    self.inner.item_count.fetch_sub(1, Ordering::Relaxed);
                    removed += 1;
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to remove from storage cache");
                }
            }
        }

        if removed > 0 {
            debug!(prefix = %prefix, count = removed, "Removed images from storage cache");
        }
        removed
    }

    async fn clear(&self) {
        let _guard = self.inner.io_lock.lock().await;
        for (path, _, _) in self.inner.list_files().await {
            if remove_entry(&path).await.is_err() {
                warn!(path = %path.display(), "Failed to remove cache file");
            }
        }
        self.inner.current_size.store(0, Ordering::Relaxed);
        self.inner.item_count.store(0, Ordering::Relaxed);
        debug!("Cleared storage cache");
    }

    async fn len(&self) -> usize {
        self.inner.item_count.load(Ordering::Relaxed)
    }
}

/// Statistics about the storage cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageStats {
    /// Bytes on disk.
    pub bytes: u64,
    /// Number of stored images.
    pub entries: usize,
    /// Byte budget.
    pub max_bytes: u64,
    /// Fit passes run so far.
    pub sweeps: u64,
    /// Highest number of fit passes ever running at once.
    pub peak_concurrent_sweeps: usize,
}

impl std::fmt::Display for StorageStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Storage cache: {} images, {}/{} bytes, {} fit passes",
            self.entries, self.bytes, self.max_bytes, self.sweeps
        )
    }
}

/// Deletes a cache file and its key sidecar, if it has one.
async fn remove_entry(path: &Path) -> std::io::Result<()> {
    fs::remove_file(path).await?;
    if is_shortened(path) {
        let _ = fs::remove_file(path.with_extension(KEY_EXT)).await;
    }
    Ok(())
}

/// Returns true if the file at `path` stores a key starting with `prefix`.
async fn stores_prefix(path: &Path, prefix: &str, escaped_prefix: &str) -> bool {
    let Some(body) = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .and_then(|stem| stem.strip_prefix(STEM_MARK))
    else {
        return false;
    };

    match body.split_once(HASH_SEP) {
        None => body.starts_with(escaped_prefix),
        Some((head, _)) if escaped_prefix.len() <= head.len() => head.starts_with(escaped_prefix),
        Some(_) => fs::read_to_string(path.with_extension(KEY_EXT))
            .await
            .is_ok_and(|key| key.starts_with(prefix)),
    }
}

fn decode_entry(bytes: &[u8]) -> CacheResult<image::DynamicImage> {
    codec::decode(bytes, None).map_err(|e| CacheError::DecodeError(e.to_string()))
}

fn encode_entry(image: &image::DynamicImage, format: CompressFormat) -> CacheResult<Vec<u8>> {
    codec::encode(image, format).map_err(|e| CacheError::EncodeError(e.to_string()))
}

const STEM_MARK: char = 'k';

/// Maps a cache key to a file stem: `k` followed by the escaped key.
///
/// Escaped keys of [`MAX_PLAIN_STEM`] bytes or more keep their first
/// [`HEAD_LEN`] bytes, then `~` and a digest of the whole key. `~` is
/// always escaped, so it only appears in shortened stems.
fn stem_for(key: &str) -> String {
    let escaped = escape_key(key);
    if escaped.len() < MAX_PLAIN_STEM {
        return format!("{STEM_MARK}{escaped}");
    }
    let digest = CacheKey::hashed(key.as_bytes());
    format!("{STEM_MARK}{}{HASH_SEP}{digest}", &escaped[..HEAD_LEN])
}

fn is_shortened(path: &Path) -> bool {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .is_some_and(|stem| stem.contains(HASH_SEP))
}

/// Every byte outside `[A-Za-z0-9._-]` becomes `%XX`. The mapping is
/// injective and preserves prefixes.
fn escape_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.') {
            out.push(char::from(byte));
        } else {
            let _ = write!(out, "%{byte:02X}");
        }
    }
    out
}

fn has_ext(path: &Path, ext: &str) -> bool {
    path.extension().is_some_and(|e| e == ext)
}

/// Sets the modification time to now; it is the recency signal for eviction.
async fn touch(path: PathBuf) {
    let result = tokio::task::spawn_blocking(move || {
        std::fs::File::options()
            .write(true)
            .open(&path)?
            .set_modified(SystemTime::now())
    })
    .await;

    if let Ok(Err(e)) = result {
        trace!(error = %e, "Failed to touch cache file");
    }
}

/// Returns the default cache directory path.
#[must_use]
pub fn default_cache_dir() -> PathBuf {
    directories::ProjectDirs::from("com", "linuxmobile", "pixload").map_or_else(
        || {
            std::env::temp_dir()
                .join("pixload")
                .join("cache")
                .join("images")
        },
        |dirs| dirs.cache_dir().join("images"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    async fn create_test_cache(max_size: u64) -> (StorageImageCache, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let cache = StorageImageCache::new(
            temp_dir.path().to_path_buf(),
            max_size,
            CompressFormat::Png,
        )
        .await
        .unwrap();
        (cache, temp_dir)
    }

    fn img(width: u32, height: u32) -> Arc<image::DynamicImage> {
        Arc::new(image::DynamicImage::new_rgb8(width, height))
    }

    fn set_age(path: &Path, age_secs: u64) {
        let file = std::fs::File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() - Duration::from_secs(age_secs))
            .unwrap();
    }

    #[tokio::test]
    async fn test_put_and_get_round_trip() {
        let (cache, _temp) = create_test_cache(1024 * 1024).await;

        cache.put("test1", img(37, 21)).await;
        let retrieved = cache.get("test1").await.unwrap();

        assert_eq!((retrieved.width(), retrieved.height()), (37, 21));
    }

    #[tokio::test]
    async fn test_cache_miss() {
        let (cache, _temp) = create_test_cache(1024 * 1024).await;
        assert!(cache.get("nonexistent").await.is_none());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_a_miss() {
        let (cache, _temp) = create_test_cache(1024 * 1024).await;
        std::fs::write(cache.cache_path("broken"), b"not an image").unwrap();

        assert!(cache.get("broken").await.is_none());
    }

    #[tokio::test]
    async fn test_get_refreshes_recency() {
        let (cache, _temp) = create_test_cache(1024 * 1024).await;
        cache.put("old", img(2, 2)).await;
        let path = cache.cache_path("old");
        set_age(&path, 3600);

        let _ = cache.get("old").await;

        let modified = std::fs::metadata(&path).unwrap().modified().unwrap();
        let age = SystemTime::now().duration_since(modified).unwrap_or_default();
        assert!(age < Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_remove_by_prefix() {
        let (cache, _temp) = create_test_cache(1024 * 1024).await;
        cache.put("a", img(2, 2)).await;
        cache.put("a_t1", img(2, 2)).await;
        cache.put("b", img(2, 2)).await;

        assert_eq!(cache.remove("a").await, 2);
        assert!(!cache.contains("a").await);
        assert!(!cache.contains("a_t1").await);
        assert!(cache.contains("b").await);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_escaped_keys_keep_prefix_semantics() {
        let (cache, _temp) = create_test_cache(1024 * 1024).await;
        cache.put("https://x/a.png", img(2, 2)).await;
        cache.put("https://x/a.png_10x10", img(2, 2)).await;
        cache.put("https://x/b.png", img(2, 2)).await;

        assert_eq!(cache.remove("https://x/a").await, 2);
        assert!(cache.contains("https://x/b.png").await);
    }

    #[tokio::test]
    async fn test_clear() {
        let (cache, _temp) = create_test_cache(1024 * 1024).await;
        cache.put("test1", img(2, 2)).await;
        cache.put("test2", img(2, 2)).await;
        assert_eq!(cache.len().await, 2);

        cache.clear().await;
        assert_eq!(cache.len().await, 0);
        assert_eq!(cache.current_size(), 0);
    }

    #[tokio::test]
    async fn test_counters_track_replacement() {
        let (cache, _temp) = create_test_cache(1024 * 1024).await;
        cache.put("test1", img(4, 4)).await;
        let first = cache.current_size();
        cache.put("test1", img(4, 4)).await;

        assert_eq!(cache.len().await, 1);
        assert_eq!(cache.current_size(), first);
    }

    #[tokio::test]
    async fn test_no_temp_files_left_behind() {
        let (cache, temp) = create_test_cache(1024 * 1024).await;
        cache.put("k", img(3, 3)).await;

        let leftovers = std::fs::read_dir(temp.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| has_ext(&e.path(), TEMP_EXT))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn test_eviction_keeps_most_recent_within_budget() {
        let (cache, _temp) = create_test_cache(3500).await;

        for (key, age) in [("a", 400), ("b", 300), ("c", 200), ("d", 100)] {
            let path = cache.cache_path(key);
            std::fs::write(&path, vec![0u8; 1000]).unwrap();
            set_age(&path, age);
            cache.inner.current_size.fetch_add(1000, Ordering::Relaxed);
            cache.inner.item_count.fetch_add(1, Ordering::Relaxed);
        }

        cache.put("e", img(1, 1)).await;
        cache.wait_for_fit().await;

        assert!(!cache.contains("a").await);
        for key in ["b", "c", "d", "e"] {
            assert!(cache.contains(key).await, "{key} should survive");
        }
        assert!(cache.current_size() <= 3500);
        assert_eq!(cache.len().await, 4);
    }

    #[tokio::test]
    async fn test_open_existing_directory_fits_budget() {
        let temp_dir = TempDir::new().unwrap();
        for (i, age) in [500u64, 400, 300].iter().enumerate() {
            let path = temp_dir.path().join(format!("{}.{CACHE_EXT}", stem_for(&format!("k{i}"))));
            std::fs::write(&path, vec![0u8; 100]).unwrap();
            set_age(&path, *age);
        }
        std::fs::write(temp_dir.path().join("x.img.tmp"), b"partial").unwrap();

        let cache = StorageImageCache::new(temp_dir.path().to_path_buf(), 250, CompressFormat::Png)
            .await
            .unwrap();
        cache.wait_for_fit().await;

        assert!(!cache.contains("k0").await);
        assert!(cache.contains("k1").await);
        assert!(cache.contains("k2").await);
        assert!(!temp_dir.path().join("x.img.tmp").exists());
        assert_eq!(cache.current_size(), 200);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_puts_coalesce_fit_passes() {
        let (cache, _temp) = create_test_cache(2000).await;

        let tasks: Vec<_> = (0..32)
            .map(|i| {
                let cache = cache.clone();
                tokio::spawn(async move {
                    cache.put(&format!("key{i}"), img(16, 16)).await;
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }
        cache.wait_for_fit().await;

        let stats = cache.stats();
        assert_eq!(stats.peak_concurrent_sweeps, 1);
        assert!(stats.sweeps >= 1);
        assert!(stats.sweeps <= 33);
        assert!(cache.current_size() <= 2000);
    }

    #[tokio::test]
    async fn test_empty_key_is_listed_and_cleared() {
        let (cache, temp) = create_test_cache(1024 * 1024).await;
        cache.put("", img(4, 4)).await;
        assert!(cache.get("").await.is_some());

        cache.clear().await;

        assert!(cache.get("").await.is_none());
        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
        assert_eq!(cache.current_size(), 0);
    }

    #[tokio::test]
    async fn test_long_keys_get_short_file_names() {
        let (cache, temp) = create_test_cache(1024 * 1024).await;
        let long = format!("base_{}", "blur(1)+".repeat(60));
        let first = format!("{long}_a");
        let second = format!("{long}_b");
        cache.put(&first, img(3, 3)).await;
        cache.put(&second, img(3, 3)).await;
        cache.put("other", img(3, 3)).await;

        for entry in std::fs::read_dir(temp.path()).unwrap() {
            assert!(entry.unwrap().file_name().len() < 255);
        }
        assert_eq!(cache.get(&first).await.map(|i| i.width()), Some(3));

        assert_eq!(cache.remove(&first).await, 1);
        assert!(!cache.contains(&first).await);
        assert!(cache.contains(&second).await);

        assert_eq!(cache.remove("base").await, 1);
        assert!(cache.contains("other").await);
        let left: Vec<_> = std::fs::read_dir(temp.path())
            .unwrap()
            .filter_map(Result::ok)
            .map(|e| e.path())
            .collect();
        assert_eq!(left.len(), 1, "sidecars removed with their images: {left:?}");
    }

    #[test]
    fn test_entry_codec_errors() {
        assert!(matches!(decode_entry(b"not an image"), Err(CacheError::DecodeError(_))));

        let too_wide = image::DynamicImage::new_rgb8(65_536, 1);
        let encoded = encode_entry(&too_wide, CompressFormat::Jpeg(80));
        assert!(matches!(encoded, Err(CacheError::EncodeError(_))));
    }

    #[test]
    fn test_stem_for() {
        assert_eq!(stem_for(""), "k");
        assert_eq!(stem_for("a/b"), "ka%2Fb");
        let long = "%".repeat(100);
        let stem = stem_for(&long);
        assert_eq!(stem.len(), 1 + HEAD_LEN + 1 + 32);
        assert!(stem.starts_with(&format!("k{}", &escape_key(&long)[..HEAD_LEN])));
        assert_ne!(stem, stem_for(&"%".repeat(101)));
    }

    #[test]
    fn test_escape_key() {
        assert_eq!(escape_key("abc_1.2-3"), "abc_1.2-3");
        assert_eq!(escape_key("a/b"), "a%2Fb");
        assert_eq!(escape_key("100%"), "100%25");
        assert!(escape_key("a/b?c").starts_with(&escape_key("a/b")));
    }
}

//! The image loader context: caches, workers, registry and view bindings.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use super::executor::Executor;
use super::pause_gate::PauseGate;
use super::registry::Registry;
use super::request::RequestBuilder;
use super::ui_thread::{UiDispatcher, ui_channel};
use super::view_registry::ViewRegistry;
use crate::domain::entities::{Source, SourceKind, StoragePolicy, ViewId};
use crate::domain::errors::{CacheError, RequestError};
use crate::domain::ports::{DescriptorFactory, Loader, MemoryCachePort, StorageCachePort};
use crate::infrastructure::config::LoaderConfig;
use crate::infrastructure::image::{
    BytesLoader, CacheStats, FileLoader, HashedDescriptors, MemoryImageCache, ResourceLoader,
    StorageImageCache, StorageStats, UriLoader,
};

/// Errors raised while building an [`ImageLoader`].
#[derive(Debug, Error)]
pub enum SetupError {
    /// The storage cache directory could not be prepared.
    #[error("storage cache setup failed: {0}")]
    Cache(#[from] CacheError),

    /// The HTTP client could not be created.
    #[error("HTTP client setup failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The UI thread could not be started.
    #[error("UI thread setup failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Entry point for image requests.
///
/// Owns both cache tiers, the worker pools, the pause gate, the source
/// registry and the per-view markers. Create one with
/// [`ImageLoader::builder`] and share it by reference.
pub struct ImageLoader {
    registry: Registry,
    memory: Arc<MemoryImageCache>,
    storage: Option<StorageImageCache>,
    policy: StoragePolicy,
    gate: Arc<PauseGate>,
    executor: Executor,
    views: Arc<ViewRegistry>,
    ui: UiDispatcher,
}

impl std::fmt::Debug for ImageLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageLoader")
            .field("registry", &self.registry)
            .field("policy", &self.policy)
            .field("storage", &self.storage.as_ref().map(StorageImageCache::dir))
            .finish_non_exhaustive()
    }
}

impl ImageLoader {
    /// Starts configuring a loader.
    #[must_use]
    pub fn builder() -> ImageLoaderBuilder {
        ImageLoaderBuilder::default()
    }

    /// Starts a request for `source`.
    ///
    /// # Errors
    /// Returns [`RequestError::UnsupportedSource`] if no loader is
    /// registered for the source's kind.
    pub fn request(&self, source: impl Into<Source>) -> Result<RequestBuilder<'_>, RequestError> {
        let source = source.into();
        let registration = self.registry.resolve(&source)?;
        let loader = registration.loader.clone();
        let descriptor = registration.factory.describe(source);
        Ok(RequestBuilder::new(self, descriptor, loader))
    }

    /// Holds new work at the pause gate.
    pub fn pause(&self) {
        self.gate.set_paused(true);
    }

    /// Releases work held at the pause gate.
    pub fn resume(&self) {
        self.gate.set_paused(false);
    }

    /// Makes actions waiting at the gate abandon instead of proceeding.
    pub fn set_interrupt_early(&self, interrupt: bool) {
        self.gate.set_interrupt_early(interrupt);
    }

    /// Returns true while paused.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.gate.is_paused()
    }

    /// Cancels whatever is loading into `view` and unbinds it.
    /// Returns true if a pending action was cancelled.
    pub fn cancel_view(&self, view: ViewId) -> bool {
        self.views
            .detach(view)
            .is_some_and(|handle| handle.cancel())
    }

    /// Removes every entry whose key starts with `prefix` from both tiers.
    pub async fn invalidate_key(&self, prefix: &str) {
        let from_memory = self.memory.remove(prefix);
        let from_storage = match &self.storage {
            Some(storage) => storage.remove(prefix).await,
            None => 0,
        };
        debug!(prefix, from_memory, from_storage, "Invalidated cache entries");
    }

    /// Empties both tiers.
    pub async fn clear_caches(&self) {
        self.memory.clear();
        if let Some(storage) = &self.storage {
            storage.clear().await;
        }
        info!("Cleared image caches");
    }

    /// Waits for scheduled storage writes and the fit passes they started.
    pub async fn flush(&self) {
        self.executor.writes_settled().await;
        if let Some(storage) = &self.storage {
            storage.wait_for_fit().await;
        }
    }

    /// Returns memory cache statistics.
    #[must_use]
    pub fn memory_stats(&self) -> CacheStats {
        self.memory.stats()
    }

    /// Returns storage cache statistics, if storage is enabled.
    #[must_use]
    pub fn storage_stats(&self) -> Option<StorageStats> {
        self.storage.as_ref().map(StorageImageCache::stats)
    }

    /// Returns the memory cache tier.
    #[must_use]
    pub const fn memory_cache(&self) -> &Arc<MemoryImageCache> {
        &self.memory
    }

    /// Returns the storage cache tier, if enabled.
    #[must_use]
    pub const fn storage_cache(&self) -> Option<&StorageImageCache> {
        self.storage.as_ref()
    }

    /// Returns the pause gate shared by every action.
    #[must_use]
    pub const fn pause_gate(&self) -> &Arc<PauseGate> {
        &self.gate
    }

    /// Returns the view markers.
    #[must_use]
    pub const fn views(&self) -> &Arc<ViewRegistry> {
        &self.views
    }

    pub(crate) const fn storage_policy(&self) -> StoragePolicy {
        self.policy
    }

    pub(crate) const fn executor(&self) -> &Executor {
        &self.executor
    }

    pub(crate) const fn ui(&self) -> &UiDispatcher {
        &self.ui
    }

    pub(crate) fn storage_port(&self) -> Option<Arc<dyn StorageCachePort>> {
        self.storage
            .clone()
            .map(|storage| Arc::new(storage) as Arc<dyn StorageCachePort>)
    }
}

/// Configures and builds an [`ImageLoader`].
pub struct ImageLoaderBuilder {
    config: LoaderConfig,
    registry: Registry,
    default_loaders: bool,
    ui: Option<UiDispatcher>,
    memory: Option<MemoryImageCache>,
    storage: Option<StorageImageCache>,
}

impl ImageLoaderBuilder {
    /// Uses `config` for cache sizes, workers and network settings.
    #[must_use]
    pub fn config(mut self, config: LoaderConfig) -> Self {
        self.config = config;
        self
    }

    /// Registers a descriptor factory and loader for `kind`, replacing
    /// the built-in pair if there is one.
    #[must_use]
    pub fn register(
        mut self,
        kind: SourceKind,
        factory: impl DescriptorFactory + 'static,
        loader: impl Loader + 'static,
    ) -> Self {
        self.registry.register(kind, Arc::new(factory), Arc::new(loader));
        self
    }

    /// Leaves out the built-in loaders; only explicit registrations apply.
    #[must_use]
    pub fn without_default_loaders(mut self) -> Self {
        self.default_loaders = false;
        self
    }

    /// Renders on the thread draining `ui` instead of a dedicated thread.
    #[must_use]
    pub fn ui_dispatcher(mut self, ui: UiDispatcher) -> Self {
        self.ui = Some(ui);
        self
    }

    /// Uses `cache` instead of one sized from the config.
    #[must_use]
    pub fn memory_cache(mut self, cache: MemoryImageCache) -> Self {
        self.memory = Some(cache);
        self
    }

    /// Uses `cache` instead of one opened from the config.
    #[must_use]
    pub fn storage_cache(mut self, cache: StorageImageCache) -> Self {
        self.storage = Some(cache);
        self
    }

    /// Builds the loader on the current runtime.
    ///
    /// # Errors
    /// Returns an error if the storage cache, HTTP client or UI thread
    /// cannot be set up.
    pub async fn build(self) -> Result<ImageLoader, SetupError> {
        let config = self.config;

        let mut registry = Registry::new();
        if self.default_loaders {
            register_defaults(&mut registry, &config)?;
        }
        registry.extend(self.registry);

        let memory = Arc::new(
            self.memory
                .unwrap_or_else(|| MemoryImageCache::new(config.memory.capacity())),
        );

        let storage = match self.storage {
            Some(storage) => Some(storage),
            None if config.storage.enabled => Some(
                StorageImageCache::new(
                    config.storage.effective_directory(),
                    config.storage.max_size_bytes,
                    config.storage.compress_format(),
                )
                .await?,
            ),
            None => None,
        };

        let ui = match self.ui {
            Some(ui) => ui,
            None => {
                let (ui, queue) = ui_channel();
                queue.spawn_thread()?;
                ui
            }
        };

        let executor = Executor::current(config.workers.load_workers, config.workers.cache_writers);

        info!(
            memory_capacity = memory.capacity(),
            storage = ?storage.as_ref().map(StorageImageCache::dir),
            workers = config.workers.load_workers,
            "Image loader ready"
        );

        Ok(ImageLoader {
            registry,
            memory,
            storage,
            policy: config.storage.policy,
            gate: Arc::new(PauseGate::new()),
            executor,
            views: Arc::new(ViewRegistry::new()),
            ui,
        })
    }
}

impl Default for ImageLoaderBuilder {
    fn default() -> Self {
        Self {
            config: LoaderConfig::default(),
            registry: Registry::new(),
            default_loaders: true,
            ui: None,
            memory: None,
            storage: None,
        }
    }
}

fn register_defaults(registry: &mut Registry, config: &LoaderConfig) -> Result<(), SetupError> {
    let descriptors: Arc<dyn DescriptorFactory> = Arc::new(HashedDescriptors);

    let http = UriLoader::new(config.network.timeout(), config.network.max_body_bytes)?;
    registry.register(SourceKind::Uri, descriptors.clone(), Arc::new(http));
    registry.register(SourceKind::File, descriptors.clone(), Arc::new(FileLoader));
    registry.register(SourceKind::Bytes, descriptors.clone(), Arc::new(BytesLoader));

    if let Some(root) = &config.resource_dir {
        registry.register(SourceKind::Resource, descriptors, Arc::new(ResourceLoader::new(root.clone())));
    }
    Ok(())
}

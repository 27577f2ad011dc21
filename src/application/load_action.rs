//! Cancellable load actions.
//!
//! A [`LoadAction`] runs one request through the pipeline: pause gate,
//! memory cache, storage cache, loader, transformation, delivery and an
//! asynchronous storage write. Its state only moves forward, and exactly
//! one of the terminal states is reached.

use std::sync::Arc;

use image::DynamicImage;
use parking_lot::Mutex;
use tokio::sync::{oneshot, watch};
use tracing::{debug, trace, warn};

use super::executor::{Executor, WriteTicket};
use super::pause_gate::PauseGate;
use crate::domain::entities::{
    ActionId, ActionState, CacheKey, CacheMode, Checkpoint, DataDescriptor, ImageSource,
    LoadedImage, Size, Source, StoragePolicy,
};
use crate::domain::errors::LoadError;
use crate::domain::ports::{Loader, MemoryCachePort, StorageCachePort, Transformation};

/// Called on the worker once an image has been delivered.
pub type LoadCallback = Box<dyn FnOnce(&Source, &Arc<DynamicImage>) + Send>;

/// Called on the worker once an error has been delivered.
pub type ErrorCallback = Box<dyn FnOnce(&Source, &LoadError) + Send>;

/// Called synchronously by whoever cancels the action.
pub type CancelCallback = Box<dyn FnOnce() + Send>;

/// Outcome sent to a `fetch` caller.
pub(crate) type FetchResult = Result<LoadedImage, Arc<LoadError>>;

/// Extension point run after the callbacks on delivery.
///
/// Display actions use this to move rendering onto the UI thread.
pub trait ActionHook: Send + Sync {
    /// The action delivered `loaded`.
    fn delivered(self: Arc<Self>, source: &Source, loaded: &LoadedImage);

    /// The action delivered `error`.
    fn errored(self: Arc<Self>, source: &Source, error: &Arc<LoadError>);
}

struct ActionCore {
    id: ActionId,
    key: Option<CacheKey>,
    state: watch::Sender<ActionState>,
    cancelled_at: Mutex<Option<Checkpoint>>,
    on_cancelled: Mutex<Vec<CancelCallback>>,
}

impl ActionCore {
    /// Moves from one of `from` to `to`. Returns false if the current
    /// state was not in `from`.
    fn transition(&self, from: &[ActionState], to: ActionState) -> bool {
        self.state.send_if_modified(|state| {
            if from.contains(state) {
                *state = to;
                true
            } else {
                false
            }
        })
    }

    fn state(&self) -> ActionState {
        *self.state.borrow()
    }

    fn is_cancelled(&self) -> bool {
        self.state() == ActionState::Cancelled
    }

    fn cancel(&self) -> bool {
        if !self.transition(&[ActionState::New, ActionState::Running], ActionState::Cancelled) {
            return false;
        }
        debug!(id = %self.id, "Cancelled load action");

        let hooks = std::mem::take(&mut *self.on_cancelled.lock());
        for hook in hooks {
            hook();
        }
        true
    }

    fn record_abort(&self, checkpoint: Checkpoint) {
        let mut at = self.cancelled_at.lock();
        if at.is_none() {
            *at = Some(checkpoint);
            trace!(id = %self.id, ?checkpoint, "Load action stopped");
        }
    }

    /// Drops cancel hooks once they can no longer run.
    fn settle(&self) {
        self.on_cancelled.lock().clear();
    }
}

/// Cheap, cloneable view of a load action.
#[derive(Clone)]
pub struct ActionHandle {
    core: Arc<ActionCore>,
}

impl ActionHandle {
    /// Returns the action id.
    #[must_use]
    pub fn id(&self) -> ActionId {
        self.core.id
    }

    /// Returns the full cache key, if the source is cacheable.
    #[must_use]
    pub fn key(&self) -> Option<&CacheKey> {
        self.core.key.as_ref()
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> ActionState {
        self.core.state()
    }

    /// Returns true while the action may still deliver.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.state().is_pending()
    }

    /// Cancels the action if it has not delivered yet.
    ///
    /// Runs the cancel callbacks on the calling thread before returning.
    /// Returns false if the action had already reached a terminal state.
    pub fn cancel(&self) -> bool {
        self.core.cancel()
    }

    /// Returns the checkpoint at which a cancelled action stopped working.
    #[must_use]
    pub fn cancelled_at(&self) -> Option<Checkpoint> {
        *self.core.cancelled_at.lock()
    }

    /// Waits for a terminal state and returns it.
    pub async fn finished(&self) -> ActionState {
        let mut state = self.core.state.subscribe();
        match state.wait_for(|s| s.is_terminal()).await {
            Ok(state) => *state,
            Err(_) => self.state(),
        }
    }
}

impl std::fmt::Debug for ActionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionHandle")
            .field("id", &self.core.id)
            .field("key", &self.core.key)
            .field("state", &self.state())
            .finish()
    }
}

enum Halt {
    Cancelled(Checkpoint),
    Failed(LoadError),
}

/// One request moving through the load pipeline.
///
/// Built with [`LoadAction::builder`] and consumed by [`LoadAction::submit`],
/// so an action runs at most once.
pub struct LoadAction {
    core: Arc<ActionCore>,
    descriptor: DataDescriptor,
    loader: Arc<dyn Loader>,
    size: Option<Size>,
    transform: Option<Arc<dyn Transformation>>,
    memory: Option<Arc<dyn MemoryCachePort>>,
    storage: Option<Arc<dyn StorageCachePort>>,
    cache_mode: CacheMode,
    policy: StoragePolicy,
    gate: Arc<PauseGate>,
    on_load: Option<LoadCallback>,
    on_error: Option<ErrorCallback>,
    result: Option<oneshot::Sender<FetchResult>>,
    hook: Option<Arc<dyn ActionHook>>,
}

impl LoadAction {
    /// Starts building an action for `descriptor` loaded by `loader`.
    #[must_use]
    pub fn builder(
        descriptor: DataDescriptor,
        loader: Arc<dyn Loader>,
        gate: Arc<PauseGate>,
    ) -> LoadActionBuilder {
        LoadActionBuilder {
            id: ActionId::new(),
            descriptor,
            loader,
            gate,
            size: None,
            transform: None,
            memory: None,
            storage: None,
            cache_mode: CacheMode::default(),
            policy: StoragePolicy::default(),
            on_load: None,
            on_error: None,
            on_cancelled: Vec::new(),
            result: None,
            hook: None,
        }
    }

    /// Returns a handle observing this action.
    #[must_use]
    pub fn handle(&self) -> ActionHandle {
        ActionHandle {
            core: self.core.clone(),
        }
    }

    /// Schedules the action on `executor` and returns its handle.
    pub fn submit(self, executor: &Executor) -> ActionHandle {
        let handle = self.handle();
        let executor = executor.clone();
        let task_executor = executor.clone();

        executor.spawn(async move {
            let mut state = self.core.state.subscribe();
            let permit = tokio::select! {
                permit = task_executor.workers().acquire_owned() => permit.ok(),
                _ = state.wait_for(|s| *s == ActionState::Cancelled) => None,
            };

            let Some(_permit) = permit else {
                self.core.record_abort(Checkpoint::Gate);
                return;
            };
            self.execute(&task_executor).await;
        });

        handle
    }

    async fn execute(mut self, executor: &Executor) {
        if !self
            .core
            .transition(&[ActionState::New], ActionState::Running)
        {
            self.core.record_abort(Checkpoint::Gate);
            return;
        }
        trace!(id = %self.core.id, source = %self.descriptor.source, "Load action running");

        match self.run(executor).await {
            Ok(()) => {}
            Err(Halt::Cancelled(checkpoint)) => self.core.record_abort(checkpoint),
            Err(Halt::Failed(err)) => self.fail(err),
        }
    }

    async fn run(&mut self, executor: &Executor) -> Result<(), Halt> {
        Self::pass_gate(&self.core, &self.gate).await?;

        let key = self.core.key.clone();

        if let Some(key) = &key
            && self.cache_mode.contains(CacheMode::READ_MEMORY)
            && let Some(memory) = &self.memory
            && let Some(image) = memory.get(key.as_str())
        {
            return self.deliver(LoadedImage {
                key: Some(key.clone()),
                image,
                source: ImageSource::Memory,
            });
        }
        self.checkpoint(Checkpoint::MemoryLookup)?;

        if let Some(key) = &key
            && self.cache_mode.contains(CacheMode::READ_STORAGE)
            && let Some(storage) = &self.storage
            && let Some(image) = storage.get(key.as_str()).await
        {
            self.checkpoint(Checkpoint::StorageLookup)?;
            self.remember(key, &image);
            return self.deliver(LoadedImage {
                key: Some(key.clone()),
                image,
                source: ImageSource::Storage,
            });
        }
        self.checkpoint(Checkpoint::StorageLookup)?;

        let loaded = self.loader.load(&self.descriptor.source, self.size).await;
        self.checkpoint(Checkpoint::Load)?;
        let image = match loaded {
            Ok(Some(image)) => image,
            Ok(None) => return Err(Halt::Failed(LoadError::NotLoaded)),
            Err(err) => return Err(Halt::Failed(LoadError::failed(err))),
        };

        let image = match self.transform.clone() {
            Some(transform) => {
                let image = apply(transform, image).await.map_err(Halt::Failed)?;
                self.checkpoint(Checkpoint::Transform)?;
                image
            }
            None => Arc::new(image),
        };

        if let Some(key) = &key {
            self.remember(key, &image);
        }
        let ticket = self.storage_ticket(executor, key.is_some());
        self.deliver(LoadedImage {
            key: key.clone(),
            image: image.clone(),
            source: ImageSource::Loader,
        })?;

        if let (Some(key), Some((storage, ticket))) = (key, ticket) {
            let writers = executor.writers();
            executor.spawn(async move {
                let _ticket = ticket;
                let Ok(_permit) = writers.acquire_owned().await else {
                    return;
                };
                storage.put(key.as_str(), image).await;
            });
        }
        Ok(())
    }

    /// Waits at the gate, racing cancellation. Takes the shared parts only
    /// so the worker future does not need the action to be `Sync`.
    async fn pass_gate(core: &ActionCore, gate: &PauseGate) -> Result<(), Halt> {
        if core.is_cancelled() {
            return Err(Halt::Cancelled(Checkpoint::Gate));
        }

        let mut state = core.state.subscribe();
        tokio::select! {
            aborted = gate.wait() => {
                if aborted {
                    debug!(id = %core.id, "Load action interrupted at pause gate");
                    core.cancel();
                }
            }
            _ = state.wait_for(|s| *s == ActionState::Cancelled) => {}
        }

        if core.is_cancelled() {
            Err(Halt::Cancelled(Checkpoint::Gate))
        } else {
            Ok(())
        }
    }

    fn checkpoint(&self, checkpoint: Checkpoint) -> Result<(), Halt> {
        if self.core.is_cancelled() {
            Err(Halt::Cancelled(checkpoint))
        } else {
            Ok(())
        }
    }

    fn remember(&self, key: &CacheKey, image: &Arc<DynamicImage>) {
        if self.cache_mode.contains(CacheMode::WRITE_MEMORY)
            && let Some(memory) = &self.memory
        {
            memory.put(key.as_str(), image.clone());
        }
    }

    fn deliver(&mut self, loaded: LoadedImage) -> Result<(), Halt> {
        if !self
            .core
            .transition(&[ActionState::Running], ActionState::Delivered)
        {
            return Err(Halt::Cancelled(Checkpoint::Deliver));
        }
        self.core.settle();
        debug!(
            id = %self.core.id,
            source = %self.descriptor.source,
            from = %loaded.source,
            "Delivered image"
        );

        if let Some(on_load) = self.on_load.take() {
            on_load(&self.descriptor.source, &loaded.image);
        }
        if let Some(hook) = self.hook.clone() {
            hook.delivered(&self.descriptor.source, &loaded);
        }
        if let Some(result) = self.result.take() {
            let _ = result.send(Ok(loaded));
        }
        Ok(())
    }

    fn fail(&mut self, err: LoadError) {
        if !self
            .core
            .transition(&[ActionState::Running], ActionState::Errored)
        {
            self.core.record_abort(Checkpoint::Deliver);
            return;
        }
        self.core.settle();
        warn!(id = %self.core.id, source = %self.descriptor.source, error = %err, "Load failed");

        if let Some(on_error) = self.on_error.take() {
            on_error(&self.descriptor.source, &err);
        }
        let err = Arc::new(err);
        if let Some(hook) = self.hook.clone() {
            hook.errored(&self.descriptor.source, &err);
        }
        if let Some(result) = self.result.take() {
            let _ = result.send(Err(err));
        }
    }

    /// Reserves a storage write if the policy wants this result stored.
    /// Must run before delivery.
    fn storage_ticket(
        &self,
        executor: &Executor,
        cacheable: bool,
    ) -> Option<(Arc<dyn StorageCachePort>, WriteTicket)> {
        let modified = self.size.is_some() || self.transform.is_some();
        if !cacheable
            || !self.cache_mode.contains(CacheMode::WRITE_STORAGE)
            || !self.policy.should_store(self.descriptor.location, modified)
        {
            return None;
        }
        let storage = self.storage.clone()?;
        Some((storage, executor.begin_write()))
    }
}

/// Runs a transformation off the async workers. The input image is
/// dropped as soon as the output exists.
async fn apply(
    transform: Arc<dyn Transformation>,
    image: DynamicImage,
) -> Result<Arc<DynamicImage>, LoadError> {
    let key = transform.key();
    let output = tokio::task::spawn_blocking(move || {
        let output = transform.transform(&image);
        drop(image);
        output
    })
    .await;

    match output {
        Ok(Ok(image)) => Ok(Arc::new(image)),
        Ok(Err(err)) => Err(LoadError::transform(key, err)),
        Err(err) => Err(LoadError::transform(key, err)),
    }
}

/// Collects the parts of a [`LoadAction`].
pub struct LoadActionBuilder {
    id: ActionId,
    descriptor: DataDescriptor,
    loader: Arc<dyn Loader>,
    gate: Arc<PauseGate>,
    size: Option<Size>,
    transform: Option<Arc<dyn Transformation>>,
    memory: Option<Arc<dyn MemoryCachePort>>,
    storage: Option<Arc<dyn StorageCachePort>>,
    cache_mode: CacheMode,
    policy: StoragePolicy,
    on_load: Option<LoadCallback>,
    on_error: Option<ErrorCallback>,
    on_cancelled: Vec<CancelCallback>,
    result: Option<oneshot::Sender<FetchResult>>,
    hook: Option<Arc<dyn ActionHook>>,
}

impl LoadActionBuilder {
    /// Returns the id the built action will carry.
    #[must_use]
    pub const fn id(&self) -> ActionId {
        self.id
    }

    /// Returns the full cache key the built action will use.
    #[must_use]
    pub fn key(&self) -> Option<CacheKey> {
        let transform = self.transform.as_ref().map(|t| t.key());
        CacheKey::compose(self.descriptor.key.as_deref(), self.size, transform.as_deref())
    }

    /// Sets the target size passed to the loader.
    #[must_use]
    pub fn size(mut self, size: Option<Size>) -> Self {
        self.size = size;
        self
    }

    /// Sets the transformation applied after loading.
    #[must_use]
    pub fn transform(mut self, transform: Option<Arc<dyn Transformation>>) -> Self {
        self.transform = transform;
        self
    }

    /// Sets the memory cache tier.
    #[must_use]
    pub fn memory_cache(mut self, memory: Arc<dyn MemoryCachePort>) -> Self {
        self.memory = Some(memory);
        self
    }

    /// Sets the storage cache tier and its write policy.
    #[must_use]
    pub fn storage_cache(
        mut self,
        storage: Option<Arc<dyn StorageCachePort>>,
        policy: StoragePolicy,
    ) -> Self {
        self.storage = storage;
        self.policy = policy;
        self
    }

    /// Restricts which cache tiers are used.
    #[must_use]
    pub fn cache_mode(mut self, mode: CacheMode) -> Self {
        self.cache_mode = mode;
        self
    }

    /// Sets the success callback.
    #[must_use]
    pub fn on_load(mut self, callback: LoadCallback) -> Self {
        self.on_load = Some(callback);
        self
    }

    /// Sets the error callback.
    #[must_use]
    pub fn on_error(mut self, callback: ErrorCallback) -> Self {
        self.on_error = Some(callback);
        self
    }

    /// Adds a cancel callback.
    #[must_use]
    pub fn on_cancelled(mut self, callback: CancelCallback) -> Self {
        self.on_cancelled.push(callback);
        self
    }

    /// Sets the hook run after the callbacks.
    #[must_use]
    pub fn hook(mut self, hook: Arc<dyn ActionHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    pub(crate) fn result(mut self, sender: oneshot::Sender<FetchResult>) -> Self {
        self.result = Some(sender);
        self
    }

    /// Builds the action in the `New` state.
    #[must_use]
    pub fn build(self) -> LoadAction {
        let key = self.key();
        let (state, _) = watch::channel(ActionState::New);
        LoadAction {
            core: Arc::new(ActionCore {
                id: self.id,
                key,
                state,
                cancelled_at: Mutex::new(None),
                on_cancelled: Mutex::new(self.on_cancelled),
            }),
            descriptor: self.descriptor,
            loader: self.loader,
            size: self.size,
            transform: self.transform,
            memory: self.memory,
            storage: self.storage,
            cache_mode: self.cache_mode,
            policy: self.policy,
            gate: self.gate,
            on_load: self.on_load,
            on_error: self.on_error,
            result: self.result,
            hook: self.hook,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::Location;
    use crate::domain::ports::mocks::MockLoader;
    use crate::infrastructure::image::{Grayscale, MemoryImageCache};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    fn descriptor(key: Option<&str>, location: Location) -> DataDescriptor {
        DataDescriptor::new(Source::from("https://example.com/a.png"), key.map(String::from), location)
    }

    fn remote() -> DataDescriptor {
        descriptor(Some("abc"), Location::Remote)
    }

    fn executor() -> Executor {
        Executor::current(2, 1)
    }

    fn loader_returning(width: u32) -> Arc<MockLoader> {
        let mut loader = MockLoader::new();
        loader
            .expect_load()
            .returning(move |_, _| Ok(Some(DynamicImage::new_rgba8(width, width))));
        Arc::new(loader)
    }

    #[derive(Default)]
    struct RecordingStorage {
        entries: Mutex<std::collections::HashMap<String, Arc<DynamicImage>>>,
        written: Notify,
    }

    #[async_trait::async_trait]
    impl StorageCachePort for RecordingStorage {
        async fn get(&self, key: &str) -> Option<Arc<DynamicImage>> {
            self.entries.lock().get(key).cloned()
        }

        async fn put(&self, key: &str, image: Arc<DynamicImage>) {
            self.entries.lock().insert(key.to_string(), image);
            self.written.notify_one();
        }

        async fn remove(&self, prefix: &str) -> usize {
            let mut entries = self.entries.lock();
            let before = entries.len();
            entries.retain(|k, _| !k.starts_with(prefix));
            before - entries.len()
        }

        async fn clear(&self) {
            self.entries.lock().clear();
        }

        async fn len(&self) -> usize {
            self.entries.lock().len()
        }
    }

    /// Loader that waits until released.
    struct GatedLoader {
        started: Notify,
        release: Notify,
    }

    #[async_trait::async_trait]
    impl Loader for GatedLoader {
        async fn load(
            &self,
            _source: &Source,
            _size: Option<Size>,
        ) -> Result<Option<DynamicImage>, crate::domain::errors::BoxError> {
            self.started.notify_one();
            self.release.notified().await;
            Ok(Some(DynamicImage::new_rgba8(4, 4)))
        }
    }

    #[tokio::test]
    async fn test_delivers_loaded_image() {
        let memory = Arc::new(MemoryImageCache::new(1 << 20));
        let loaded = Arc::new(AtomicUsize::new(0));
        let counter = loaded.clone();

        let handle = LoadAction::builder(remote(), loader_returning(8), Arc::new(PauseGate::new()))
            .memory_cache(memory.clone())
            .on_load(Box::new(move |_, image| {
                assert_eq!(image.width(), 8);
                counter.fetch_add(1, Ordering::SeqCst);
            }))
            .build()
            .submit(&executor());

        assert_eq!(handle.finished().await, ActionState::Delivered);
        assert_eq!(loaded.load(Ordering::SeqCst), 1);
        assert!(memory.peek("abc").is_some());
    }

    #[tokio::test]
    async fn test_loader_error_passed_through_verbatim() {
        let mut loader = MockLoader::new();
        loader
            .expect_load()
            .returning(|_, _| Err(std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into()));

        let (tx, rx) = oneshot::channel();
        let seen = Arc::new(Mutex::new(None));
        let slot = seen.clone();

        let handle = LoadAction::builder(remote(), Arc::new(loader), Arc::new(PauseGate::new()))
            .on_error(Box::new(move |_, err| {
                let kind = err
                    .origin()
                    .and_then(|e| e.downcast_ref::<std::io::Error>())
                    .map(std::io::Error::kind);
                *slot.lock() = kind;
            }))
            .result(tx)
            .build()
            .submit(&executor());

        assert_eq!(handle.finished().await, ActionState::Errored);
        assert_eq!(*seen.lock(), Some(std::io::ErrorKind::NotFound));
        assert!(matches!(rx.await, Ok(Err(e)) if matches!(*e, LoadError::Failed { .. })));
    }

    #[tokio::test]
    async fn test_loader_without_image_reports_not_loaded() {
        let mut loader = MockLoader::new();
        loader.expect_load().returning(|_, _| Ok(None));

        let message = Arc::new(Mutex::new(String::new()));
        let slot = message.clone();

        let handle = LoadAction::builder(remote(), Arc::new(loader), Arc::new(PauseGate::new()))
            .on_error(Box::new(move |_, err| {
                assert!(err.is_not_loaded());
                *slot.lock() = err.to_string();
            }))
            .build()
            .submit(&executor());

        assert_eq!(handle.finished().await, ActionState::Errored);
        assert_eq!(*message.lock(), "image not loaded");
    }

    #[tokio::test]
    async fn test_memory_hit_skips_loader() {
        let memory = Arc::new(MemoryImageCache::new(1 << 20));
        memory.put("abc", Arc::new(DynamicImage::new_rgba8(3, 3)));

        let mut loader = MockLoader::new();
        loader.expect_load().never();

        let (tx, rx) = oneshot::channel();
        LoadAction::builder(remote(), Arc::new(loader), Arc::new(PauseGate::new()))
            .memory_cache(memory)
            .result(tx)
            .build()
            .submit(&executor());

        let loaded = rx.await.unwrap().unwrap();
        assert_eq!(loaded.source, ImageSource::Memory);
        assert_eq!(loaded.image.width(), 3);
    }

    #[tokio::test]
    async fn test_storage_hit_fills_memory() {
        let memory = Arc::new(MemoryImageCache::new(1 << 20));
        let storage = Arc::new(RecordingStorage::default());
        storage.put("abc", Arc::new(DynamicImage::new_rgba8(5, 5))).await;

        let mut loader = MockLoader::new();
        loader.expect_load().never();

        let (tx, rx) = oneshot::channel();
        LoadAction::builder(remote(), Arc::new(loader), Arc::new(PauseGate::new()))
            .memory_cache(memory.clone())
            .storage_cache(Some(storage), StoragePolicy::default())
            .result(tx)
            .build()
            .submit(&executor());

        let loaded = rx.await.unwrap().unwrap();
        assert_eq!(loaded.source, ImageSource::Storage);
        assert!(memory.peek("abc").is_some());
    }

    #[tokio::test]
    async fn test_uncacheable_source_skips_caches() {
        let memory = Arc::new(MemoryImageCache::new(1 << 20));
        let storage = Arc::new(RecordingStorage::default());

        let handle = LoadAction::builder(
            descriptor(None, Location::Remote),
            loader_returning(4),
            Arc::new(PauseGate::new()),
        )
        .memory_cache(memory.clone())
        .storage_cache(Some(storage.clone()), StoragePolicy::Always)
        .build()
        .submit(&executor());

        assert!(handle.key().is_none());
        assert_eq!(handle.finished().await, ActionState::Delivered);
        assert!(memory.is_empty());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(storage.len().await, 0);
    }

    #[tokio::test]
    async fn test_transform_applied_and_key_extended() {
        let memory = Arc::new(MemoryImageCache::new(1 << 20));
        let storage = Arc::new(RecordingStorage::default());

        let (tx, rx) = oneshot::channel();
        let handle = LoadAction::builder(
            descriptor(Some("abc"), Location::Local),
            loader_returning(4),
            Arc::new(PauseGate::new()),
        )
        .size(Size::new(4, 4))
        .transform(Some(Arc::new(Grayscale)))
        .memory_cache(memory.clone())
        .storage_cache(Some(storage.clone()), StoragePolicy::RemoteOrModified)
        .result(tx)
        .build()
        .submit(&executor());

        assert_eq!(handle.key().map(CacheKey::as_str), Some("abc_4x4_grayscale"));
        let loaded = rx.await.unwrap().unwrap();
        assert!(matches!(*loaded.image, DynamicImage::ImageLumaA8(_)));
        assert!(memory.peek("abc_4x4_grayscale").is_some());
        assert!(memory.peek("abc").is_none());

        storage.written.notified().await;
        assert!(storage.get("abc_4x4_grayscale").await.is_some());
    }

    #[tokio::test]
    async fn test_unmodified_local_result_not_stored() {
        let storage = Arc::new(RecordingStorage::default());

        let handle = LoadAction::builder(
            descriptor(Some("abc"), Location::Local),
            loader_returning(4),
            Arc::new(PauseGate::new()),
        )
        .storage_cache(Some(storage.clone()), StoragePolicy::RemoteOrModified)
        .build()
        .submit(&executor());

        assert_eq!(handle.finished().await, ActionState::Delivered);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(storage.len().await, 0);
    }

    #[tokio::test]
    async fn test_cache_mode_disables_memory_writes() {
        let memory = Arc::new(MemoryImageCache::new(1 << 20));

        let handle = LoadAction::builder(remote(), loader_returning(4), Arc::new(PauseGate::new()))
            .memory_cache(memory.clone())
            .cache_mode(CacheMode::READ_MEMORY)
            .build()
            .submit(&executor());

        assert_eq!(handle.finished().await, ActionState::Delivered);
        assert!(memory.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_during_load_suppresses_callbacks() {
        let loader = Arc::new(GatedLoader {
            started: Notify::new(),
            release: Notify::new(),
        });
        let memory = Arc::new(MemoryImageCache::new(1 << 20));
        let delivered = Arc::new(AtomicUsize::new(0));
        let cancelled = Arc::new(AtomicUsize::new(0));
        let (on_load, on_error, on_cancel) = (delivered.clone(), delivered.clone(), cancelled.clone());

        let (tx, rx) = oneshot::channel();
        let handle = LoadAction::builder(remote(), loader.clone(), Arc::new(PauseGate::new()))
            .memory_cache(memory.clone())
            .on_load(Box::new(move |_, _| {
                on_load.fetch_add(1, Ordering::SeqCst);
            }))
            .on_error(Box::new(move |_, _| {
                on_error.fetch_add(1, Ordering::SeqCst);
            }))
            .on_cancelled(Box::new(move || {
                on_cancel.fetch_add(1, Ordering::SeqCst);
            }))
            .result(tx)
            .build()
            .submit(&executor());

        loader.started.notified().await;
        assert!(handle.cancel());
        assert_eq!(cancelled.load(Ordering::SeqCst), 1);
        assert!(!handle.cancel());
        loader.release.notify_one();

        assert!(rx.await.is_err());
        assert_eq!(handle.state(), ActionState::Cancelled);
        assert_eq!(handle.cancelled_at(), Some(Checkpoint::Load));
        assert_eq!(delivered.load(Ordering::SeqCst), 0);
        assert!(memory.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_after_delivery_is_noop() {
        let cancelled = Arc::new(AtomicUsize::new(0));
        let counter = cancelled.clone();

        let handle = LoadAction::builder(remote(), loader_returning(2), Arc::new(PauseGate::new()))
            .on_cancelled(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }))
            .build()
            .submit(&executor());

        assert_eq!(handle.finished().await, ActionState::Delivered);
        assert!(!handle.cancel());
        assert_eq!(handle.state(), ActionState::Delivered);
        assert_eq!(cancelled.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_paused_action_waits_then_runs() {
        let gate = Arc::new(PauseGate::new());
        gate.set_paused(true);

        let handle = LoadAction::builder(remote(), loader_returning(2), gate.clone())
            .build()
            .submit(&executor());

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(handle.state(), ActionState::Running);

        gate.set_paused(false);
        assert_eq!(handle.finished().await, ActionState::Delivered);
    }

    #[tokio::test]
    async fn test_cancel_while_paused_stops_at_gate() {
        let gate = Arc::new(PauseGate::new());
        gate.set_paused(true);

        let mut loader = MockLoader::new();
        loader.expect_load().never();

        let handle = LoadAction::builder(remote(), Arc::new(loader), gate)
            .build()
            .submit(&executor());

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(handle.cancel());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(handle.cancelled_at(), Some(Checkpoint::Gate));
    }

    #[tokio::test]
    async fn test_interrupt_early_abandons_without_side_effects() {
        let gate = Arc::new(PauseGate::new());
        gate.set_paused(true);

        let mut loader = MockLoader::new();
        loader.expect_load().never();
        let failed = Arc::new(AtomicUsize::new(0));
        let counter = failed.clone();

        let handle = LoadAction::builder(remote(), Arc::new(loader), gate.clone())
            .on_error(Box::new(move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
            }))
            .build()
            .submit(&executor());

        tokio::time::sleep(Duration::from_millis(20)).await;
        gate.set_interrupt_early(true);

        assert_eq!(handle.finished().await, ActionState::Cancelled);
        assert_eq!(handle.cancelled_at(), Some(Checkpoint::Gate));
        assert_eq!(failed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_interrupt_early_set_before_submit_stops_unpaused_action() {
        let gate = Arc::new(PauseGate::new());
        gate.set_interrupt_early(true);
        assert!(!gate.is_paused());

        let mut loader = MockLoader::new();
        loader.expect_load().never();
        let memory = Arc::new(MemoryImageCache::new(1 << 20));
        let calls = Arc::new(AtomicUsize::new(0));
        let (on_load, on_error, on_cancel) = (calls.clone(), calls.clone(), Arc::new(AtomicUsize::new(0)));
        let cancelled = on_cancel.clone();
        let (tx, rx) = oneshot::channel();

        let handle = LoadAction::builder(remote(), Arc::new(loader), gate)
            .memory_cache(memory.clone())
            .on_load(Box::new(move |_, _| {
                on_load.fetch_add(1, Ordering::SeqCst);
            }))
            .on_error(Box::new(move |_, _| {
                on_error.fetch_add(1, Ordering::SeqCst);
            }))
            .on_cancelled(Box::new(move || {
                on_cancel.fetch_add(1, Ordering::SeqCst);
            }))
            .result(tx)
            .build()
            .submit(&executor());

        assert_eq!(handle.finished().await, ActionState::Cancelled);
        assert_eq!(handle.cancelled_at(), Some(Checkpoint::Gate));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(cancelled.load(Ordering::SeqCst), 1);
        assert!(rx.await.is_err());
        assert_eq!(memory.stats().entries, 0);
    }

    #[tokio::test]
    async fn test_transform_error_reported() {
        struct Broken;
        impl Transformation for Broken {
            fn key(&self) -> String {
                "broken".to_string()
            }
            fn transform(
                &self,
                _image: &DynamicImage,
            ) -> Result<DynamicImage, crate::domain::errors::BoxError> {
                Err("no pixels".into())
            }
        }

        let (tx, rx) = oneshot::channel();
        LoadAction::builder(remote(), loader_returning(2), Arc::new(PauseGate::new()))
            .transform(Some(Arc::new(Broken)))
            .result(tx)
            .build()
            .submit(&executor());

        let err = rx.await.unwrap().unwrap_err();
        assert!(matches!(&*err, LoadError::Transform { key, .. } if key == "broken"));
    }
}

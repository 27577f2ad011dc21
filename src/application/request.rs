//! Fluent, single-use request builder.

use std::sync::Arc;
use std::time::Duration;

use image::DynamicImage;
use tokio::sync::oneshot;
use tracing::debug;

use super::display::{DisplayCallback, DisplayHook, DisplayOptions};
use super::image_loader::ImageLoader;
use super::load_action::{
    ActionHandle, CancelCallback, ErrorCallback, LoadAction, LoadActionBuilder, LoadCallback,
};
use super::view_registry::Binding;
use crate::domain::entities::{
    CacheKey, CacheMode, DataDescriptor, Drawable, LoadedImage, Size, Source, ViewId,
};
use crate::domain::errors::{LoadError, RequestError};
use crate::domain::ports::{Loader, MemoryCachePort, Renderer, Transformation};
use crate::infrastructure::image::TransformChain;

/// Options for one request. Consumed by exactly one terminal call.
#[must_use = "a request does nothing until load, fetch, into_view or invalidate is called"]
pub struct RequestBuilder<'a> {
    context: &'a ImageLoader,
    descriptor: DataDescriptor,
    loader: Arc<dyn Loader>,
    size: Option<Size>,
    transforms: Vec<Arc<dyn Transformation>>,
    cache_mode: CacheMode,
    display: DisplayOptions,
    on_load: Option<LoadCallback>,
    on_error: Option<ErrorCallback>,
    on_display: Option<DisplayCallback>,
    on_cancelled: Vec<CancelCallback>,
}

impl<'a> RequestBuilder<'a> {
    pub(crate) fn new(
        context: &'a ImageLoader,
        descriptor: DataDescriptor,
        loader: Arc<dyn Loader>,
    ) -> Self {
        Self {
            context,
            descriptor,
            loader,
            size: None,
            transforms: Vec::new(),
            cache_mode: CacheMode::default(),
            display: DisplayOptions::default(),
            on_load: None,
            on_error: None,
            on_display: None,
            on_cancelled: Vec::new(),
        }
    }

    /// Returns the descriptor built for the source.
    #[must_use]
    pub const fn descriptor(&self) -> &DataDescriptor {
        &self.descriptor
    }

    /// Asks the loader to downsample towards `width` x `height`.
    /// Zero dimensions clear the target size.
    pub fn resize(mut self, width: u32, height: u32) -> Self {
        self.size = Size::new(width, height);
        self
    }

    /// Appends a transformation. Several are applied in order.
    pub fn transform(mut self, transformation: impl Transformation + 'static) -> Self {
        self.transforms.push(Arc::new(transformation));
        self
    }

    /// Restricts which cache tiers are used.
    pub fn cache_mode(mut self, mode: CacheMode) -> Self {
        self.cache_mode = mode;
        self
    }

    /// Cross-fades newly loaded images over `duration`.
    pub fn fade(mut self, duration: Duration) -> Self {
        self.display.fade = Some(duration);
        self
    }

    /// Rounds the corners of the displayed image.
    pub fn corner_radius(mut self, radius: f32) -> Self {
        self.display.corner_radius = Some(radius);
        self
    }

    /// Shows `drawable` while loading.
    pub fn placeholder(mut self, drawable: Drawable) -> Self {
        self.display.placeholder = Some(drawable);
        self
    }

    /// Shows `drawable` if loading fails.
    pub fn error_drawable(mut self, drawable: Drawable) -> Self {
        self.display.error = Some(drawable);
        self
    }

    /// Called on the worker with the delivered image.
    pub fn on_load(mut self, callback: impl FnOnce(&Source, &Arc<DynamicImage>) + Send + 'static) -> Self {
        self.on_load = Some(Box::new(callback));
        self
    }

    /// Called on the worker with the delivered error.
    pub fn on_error(mut self, callback: impl FnOnce(&Source, &LoadError) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(callback));
        self
    }

    /// Called on the UI thread once the image is on its view.
    pub fn on_display(
        mut self,
        callback: impl FnOnce(&Source, &Arc<DynamicImage>, ViewId) + Send + 'static,
    ) -> Self {
        self.on_display = Some(Box::new(callback));
        self
    }

    /// Called by whoever cancels the request, before `cancel` returns.
    pub fn on_cancelled(mut self, callback: impl FnOnce() + Send + 'static) -> Self {
        self.on_cancelled.push(Box::new(callback));
        self
    }

    /// Returns the full cache key this request would use.
    #[must_use]
    pub fn cache_key(&self) -> Option<CacheKey> {
        let transform = self.transformation();
        let transform_key = transform.as_ref().map(|t| t.key());
        CacheKey::compose(self.descriptor.key.as_deref(), self.size, transform_key.as_deref())
    }

    fn transformation(&self) -> Option<Arc<dyn Transformation>> {
        match self.transforms.as_slice() {
            [] => None,
            [single] => Some(single.clone()),
            many => Some(Arc::new(TransformChain::new(many.to_vec()))),
        }
    }

    fn into_action(self) -> (LoadActionBuilder, &'a ImageLoader, DisplayOptions, Option<DisplayCallback>) {
        let context = self.context;
        let transform = self.transformation();
        let memory: Arc<dyn MemoryCachePort> = context.memory_cache().clone();
        let storage = context.storage_port();

        let mut builder = LoadAction::builder(self.descriptor, self.loader, context.pause_gate().clone())
            .size(self.size)
            .transform(transform)
            .cache_mode(self.cache_mode)
            .memory_cache(memory)
            .storage_cache(storage, context.storage_policy());
        if let Some(on_load) = self.on_load {
            builder = builder.on_load(on_load);
        }
        if let Some(on_error) = self.on_error {
            builder = builder.on_error(on_error);
        }
        for on_cancelled in self.on_cancelled {
            builder = builder.on_cancelled(on_cancelled);
        }
        (builder, context, self.display, self.on_display)
    }

    /// Starts loading in the background and returns the action's handle.
    pub fn load(self) -> ActionHandle {
        let (builder, context, _, _) = self.into_action();
        builder.build().submit(context.executor())
    }

    /// Loads and waits for the result.
    ///
    /// # Errors
    /// Returns [`RequestError::Load`] if the action errored and
    /// [`RequestError::Cancelled`] if it was cancelled first.
    pub async fn fetch(self) -> Result<LoadedImage, RequestError> {
        let (builder, context, _, _) = self.into_action();
        let (tx, rx) = oneshot::channel();
        builder.result(tx).build().submit(context.executor());

        match rx.await {
            Ok(Ok(loaded)) => Ok(loaded),
            Ok(Err(err)) => Err(RequestError::Load(err)),
            Err(_) => Err(RequestError::Cancelled),
        }
    }

    /// Loads into `view`, superseding whatever the view was showing.
    ///
    /// If the view already has a pending action for the same cache key,
    /// that action is kept and its handle returned. Otherwise the previous
    /// action is cancelled before this one can render.
    pub fn into_view(self, view: ViewId, renderer: Arc<dyn Renderer>) -> ActionHandle {
        let (builder, context, display, on_display) = self.into_action();
        let hook = Arc::new(DisplayHook::new(
            builder.id(),
            view,
            renderer,
            context.views().clone(),
            context.ui().clone(),
            display,
            on_display,
        ));
        let release = hook.clone();
        let action = builder
            .hook(hook.clone())
            .on_cancelled(Box::new(move || release.release()))
            .build();

        match context.views().bind(view, action.handle()) {
            Binding::Kept(current) => {
                debug!(view = %view, "Same request already pending for view");
                return current;
            }
            Binding::Bound { previous } => {
                if let Some(previous) = previous {
                    previous.cancel();
                }
            }
        }
        hook.show_placeholder();
        action.submit(context.executor())
    }

    /// Removes every cached variant of this source from both tiers.
    pub async fn invalidate(self) {
        if let Some(base) = self.descriptor.key.as_deref().filter(|base| !base.is_empty()) {
            self.context.invalidate_key(base).await;
        }
    }
}

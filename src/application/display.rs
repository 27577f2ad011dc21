//! Binding load results to views.

use std::sync::Arc;
use std::time::Duration;

use image::DynamicImage;
use parking_lot::Mutex;
use tracing::{debug, trace};

use super::load_action::ActionHook;
use super::ui_thread::UiDispatcher;
use super::view_registry::ViewRegistry;
use crate::domain::entities::{ActionId, Drawable, LoadedImage, RenderRequest, Source, ViewId};
use crate::domain::errors::LoadError;
use crate::domain::ports::Renderer;

/// Called on the UI thread after an image has been put on its view.
pub type DisplayCallback = Box<dyn FnOnce(&Source, &Arc<DynamicImage>, ViewId) + Send>;

/// How a view presents the request while loading, on success and on error.
#[derive(Debug, Clone, Default)]
pub struct DisplayOptions {
    /// Shown immediately when the request is made.
    pub placeholder: Option<Drawable>,
    /// Shown when the load fails. Without one, failures leave the view alone.
    pub error: Option<Drawable>,
    /// Cross-fade from the placeholder for results not served from memory.
    pub fade: Option<Duration>,
    /// Rounded-corner radius applied to the delivered image.
    pub corner_radius: Option<f32>,
}

/// Renders a load action's outcome into one view.
///
/// Every render runs on the UI thread and first checks that the action
/// still owns the view. Releasing the hook drops the renderer, so a
/// cancelled action can never draw again.
pub struct DisplayHook {
    action: ActionId,
    view: ViewId,
    renderer: Mutex<Option<Arc<dyn Renderer>>>,
    views: Arc<ViewRegistry>,
    ui: UiDispatcher,
    options: DisplayOptions,
    on_display: Mutex<Option<DisplayCallback>>,
}

impl DisplayHook {
    /// Creates a hook for `action` drawing into `view`.
    #[must_use]
    pub fn new(
        action: ActionId,
        view: ViewId,
        renderer: Arc<dyn Renderer>,
        views: Arc<ViewRegistry>,
        ui: UiDispatcher,
        options: DisplayOptions,
        on_display: Option<DisplayCallback>,
    ) -> Self {
        Self {
            action,
            view,
            renderer: Mutex::new(Some(renderer)),
            views,
            ui,
            options,
            on_display: Mutex::new(on_display),
        }
    }

    /// Drops the view binding. Later renders become no-ops, and the view's
    /// marker is removed if it still names this action.
    pub fn release(&self) {
        self.renderer.lock().take();
        self.on_display.lock().take();
        self.views.release(self.view, self.action);
        trace!(view = %self.view, action = %self.action, "Released view binding");
    }

    /// Posts the placeholder, if any, to the UI thread.
    pub fn show_placeholder(self: &Arc<Self>) {
        let Some(placeholder) = self.options.placeholder.clone() else {
            return;
        };
        let hook = self.clone();
        self.ui.post(move || {
            hook.render(RenderRequest::Drawable(placeholder));
        });
    }

    /// Returns the renderer if this hook may still draw.
    fn bound_renderer(&self) -> Option<Arc<dyn Renderer>> {
        if !self.views.is_current(self.view, self.action) {
            debug!(view = %self.view, action = %self.action, "View rebound, dropping render");
            return None;
        }
        self.renderer.lock().clone()
    }

    fn render(&self, request: RenderRequest) -> bool {
        let Some(renderer) = self.bound_renderer() else {
            return false;
        };
        renderer.render(self.view, request);
        true
    }

    fn faded(&self, content: RenderRequest) -> RenderRequest {
        match self.options.fade {
            Some(duration) => RenderRequest::Fade {
                from: self.options.placeholder.clone(),
                to: Box::new(content),
                duration,
            },
            None => content,
        }
    }

    fn show_image(&self, source: &Source, loaded: &LoadedImage) {
        let content = match self.options.corner_radius {
            Some(radius) => RenderRequest::Rounded {
                image: loaded.image.clone(),
                radius,
            },
            None => RenderRequest::Bitmap(loaded.image.clone()),
        };
        let request = if loaded.from_memory() {
            content
        } else {
            self.faded(content)
        };

        if !self.render(request) {
            return;
        }
        let on_display = self.on_display.lock().take();
        if let Some(on_display) = on_display {
            on_display(source, &loaded.image, self.view);
        }
    }

    fn show_error(&self) {
        if let Some(error) = self.options.error.clone() {
            let request = self.faded(RenderRequest::Drawable(error));
            self.render(request);
        }
    }
}

// The final render and the marker release share one UI task, so a
// queued placeholder still sees the marker.
impl ActionHook for DisplayHook {
    fn delivered(self: Arc<Self>, source: &Source, loaded: &LoadedImage) {
        let source = source.clone();
        let loaded = loaded.clone();
        let hook = self.clone();
        self.ui.post(move || {
            hook.show_image(&source, &loaded);
            hook.release();
        });
    }

    fn errored(self: Arc<Self>, _source: &Source, _error: &Arc<LoadError>) {
        let hook = self.clone();
        self.ui.post(move || {
            hook.show_error();
            hook.release();
        });
    }
}

//! Per-view markers naming the action currently bound to each view.

use std::collections::HashMap;

use parking_lot::Mutex;

use super::load_action::ActionHandle;
use crate::domain::entities::{ActionId, ViewId};

/// Outcome of [`ViewRegistry::bind`].
#[derive(Debug)]
pub enum Binding {
    /// The view already had a pending action for the same key; it stays bound.
    Kept(ActionHandle),
    /// The new action now owns the view. The caller must cancel `previous`.
    Bound {
        /// The marker that was replaced.
        previous: Option<ActionHandle>,
    },
}

/// Maps views to the action that owns them.
///
/// Only the action recorded here may render into a view; a newer request
/// for the same view replaces the marker. Markers are dropped when their
/// action finishes or is cancelled.
#[derive(Debug, Default)]
pub struct ViewRegistry {
    markers: Mutex<HashMap<ViewId, ActionHandle>>,
}

impl ViewRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `handle` to `view`, returning the previous marker.
    pub fn attach(&self, view: ViewId, handle: ActionHandle) -> Option<ActionHandle> {
        self.markers.lock().insert(view, handle)
    }

    /// Binds `handle` to `view` unless the view's current action is still
    /// pending with the same cache key. Check and swap happen under one lock,
    /// so every replaced marker is handed to exactly one caller.
    pub fn bind(&self, view: ViewId, handle: ActionHandle) -> Binding {
        let mut markers = self.markers.lock();
        if let Some(current) = markers.get(&view)
            && current.is_pending()
            && current.key().is_some()
            && current.key() == handle.key()
        {
            return Binding::Kept(current.clone());
        }
        Binding::Bound {
            previous: markers.insert(view, handle),
        }
    }

    /// Returns the action bound to `view`.
    #[must_use]
    pub fn current(&self, view: ViewId) -> Option<ActionHandle> {
        self.markers.lock().get(&view).cloned()
    }

    /// Returns true if `action` still owns `view`.
    #[must_use]
    pub fn is_current(&self, view: ViewId, action: ActionId) -> bool {
        self.markers
            .lock()
            .get(&view)
            .is_some_and(|handle| handle.id() == action)
    }

    /// Unbinds `view`, returning its marker.
    pub fn detach(&self, view: ViewId) -> Option<ActionHandle> {
        self.markers.lock().remove(&view)
    }

    /// Unbinds `view` only if `action` still owns it.
    pub fn release(&self, view: ViewId, action: ActionId) -> bool {
        let mut markers = self.markers.lock();
        if markers.get(&view).is_some_and(|handle| handle.id() == action) {
            markers.remove(&view);
            true
        } else {
            false
        }
    }

    /// Returns the number of bound views.
    #[must_use]
    pub fn len(&self) -> usize {
        self.markers.lock().len()
    }

    /// Returns true if no view is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.markers.lock().is_empty()
    }
}

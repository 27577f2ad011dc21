//! Port definition for putting images on views.

use crate::domain::entities::{RenderRequest, ViewId};

/// Applies render requests to views. Only ever called on the UI thread.
pub trait Renderer: Send + Sync {
    /// Shows `request` on `view`.
    fn render(&self, view: ViewId, request: RenderRequest);
}

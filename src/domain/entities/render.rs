//! Render requests interpreted by the UI-side renderer.

use std::sync::Arc;
use std::time::Duration;

/// Opaque handle for a UI view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewId(pub u64);

impl From<u64> for ViewId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for ViewId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "view#{}", self.0)
    }
}

/// Static content used for placeholders and error states.
#[derive(Debug, Clone, PartialEq)]
pub enum Drawable {
    /// A pre-decoded image.
    Image(Arc<image::DynamicImage>),
    /// A solid RGBA color.
    Color([u8; 4]),
    /// A named asset owned by the renderer.
    Resource(String),
}

/// What the renderer should show on a view.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderRequest {
    /// Show a placeholder or error drawable.
    Drawable(Drawable),
    /// Show a bitmap as-is.
    Bitmap(Arc<image::DynamicImage>),
    /// Show a bitmap clipped to rounded corners.
    Rounded {
        /// Image to show.
        image: Arc<image::DynamicImage>,
        /// Corner radius in pixels.
        radius: f32,
    },
    /// Cross-fade from the previous content to a new request.
    Fade {
        /// Content faded out, if known.
        from: Option<Drawable>,
        /// Content faded in.
        to: Box<RenderRequest>,
        /// Transition length.
        duration: Duration,
    },
}

impl RenderRequest {
    /// Returns the request shown once any transition has finished.
    #[must_use]
    pub fn settled(&self) -> &Self {
        match self {
            Self::Fade { to, .. } => to.settled(),
            other => other,
        }
    }
}

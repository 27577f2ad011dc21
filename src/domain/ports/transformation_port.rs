//! Port definition for image transformations.

use crate::domain::errors::BoxError;

/// A stateless image-to-image function.
pub trait Transformation: Send + Sync {
    /// Identifies the effect; appended to cache keys.
    fn key(&self) -> String;

    /// Applies the effect, returning a new image.
    ///
    /// # Errors
    /// Returns any error that prevents producing the output image.
    fn transform(&self, image: &image::DynamicImage) -> Result<image::DynamicImage, BoxError>;
}

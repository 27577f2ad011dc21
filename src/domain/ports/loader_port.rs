//! Port definitions for turning sources into images.

use async_trait::async_trait;

use crate::domain::entities::{DataDescriptor, Size, Source};
use crate::domain::errors::BoxError;

/// Produces a decoded image for a source.
///
/// Errors are passed to the error callback unchanged. Returning `Ok(None)`
/// reports the distinguished "image not loaded" condition.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Loader: Send + Sync {
    /// Loads the image, downsampling towards `size` when given.
    async fn load(
        &self,
        source: &Source,
        size: Option<Size>,
    ) -> Result<Option<image::DynamicImage>, BoxError>;
}

/// Builds the cache identity for a source.
pub trait DescriptorFactory: Send + Sync {
    /// Describes a source.
    fn describe(&self, source: Source) -> DataDescriptor;
}

impl<F> DescriptorFactory for F
where
    F: Fn(Source) -> DataDescriptor + Send + Sync,
{
    fn describe(&self, source: Source) -> DataDescriptor {
        self(source)
    }
}

//! Decoded image results.

use std::sync::Arc;

use super::CacheKey;

/// Where a delivered image came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSource {
    /// Served from the in-memory LRU cache.
    Memory,
    /// Decoded from the storage cache.
    Storage,
    /// Produced by the loader (and transformation, if any).
    Loader,
}

impl std::fmt::Display for ImageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Memory => write!(f, "memory"),
            Self::Storage => write!(f, "storage"),
            Self::Loader => write!(f, "loader"),
        }
    }
}

/// A decoded image ready to be delivered.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    /// Full cache key, if the request was cacheable.
    pub key: Option<CacheKey>,
    /// The decoded image.
    pub image: Arc<image::DynamicImage>,
    /// Where it came from.
    pub source: ImageSource,
}

impl LoadedImage {
    /// Returns true if this image was served from the memory cache.
    #[must_use]
    pub const fn from_memory(&self) -> bool {
        matches!(self.source, ImageSource::Memory)
    }
}

/// Approximate resident size of a decoded image in bytes.
#[must_use]
pub fn image_byte_size(image: &image::DynamicImage) -> usize {
    image.as_bytes().len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_byte_size() {
        let img = image::DynamicImage::new_rgba8(10, 10);
        assert_eq!(image_byte_size(&img), 400);
        let img = image::DynamicImage::new_rgb8(10, 10);
        assert_eq!(image_byte_size(&img), 300);
    }
}

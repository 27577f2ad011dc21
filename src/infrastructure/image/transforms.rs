//! Built-in transformations.

use std::sync::Arc;

use image::DynamicImage;
use image::imageops::FilterType;

use crate::domain::entities::Size;
use crate::domain::errors::BoxError;
use crate::domain::ports::Transformation;

/// Resizes to exact dimensions.
#[derive(Debug, Clone, Copy)]
pub struct Resize(pub Size);

impl Transformation for Resize {
    fn key(&self) -> String {
        format!("resize({})", self.0)
    }

    fn transform(&self, image: &DynamicImage) -> Result<DynamicImage, BoxError> {
        Ok(image.resize_exact(self.0.width, self.0.height, FilterType::Triangle))
    }
}

/// Converts to grayscale.
#[derive(Debug, Clone, Copy, Default)]
pub struct Grayscale;

impl Transformation for Grayscale {
    fn key(&self) -> String {
        "grayscale".to_string()
    }

    fn transform(&self, image: &DynamicImage) -> Result<DynamicImage, BoxError> {
        Ok(image.grayscale())
    }
}

/// Gaussian blur.
#[derive(Debug, Clone, Copy)]
pub struct Blur {
    /// Standard deviation of the kernel.
    pub sigma: f32,
}

impl Transformation for Blur {
    fn key(&self) -> String {
        format!("blur({})", self.sigma)
    }

    fn transform(&self, image: &DynamicImage) -> Result<DynamicImage, BoxError> {
        if !self.sigma.is_finite() || self.sigma < 0.0 {
            return Err(format!("invalid blur sigma {}", self.sigma).into());
        }
        Ok(image.blur(self.sigma))
    }
}

/// Applies several transformations in order.
///
/// Each intermediate result is dropped as soon as the next one exists.
#[derive(Clone, Default)]
pub struct TransformChain(Vec<Arc<dyn Transformation>>);

impl TransformChain {
    /// Creates a chain.
    #[must_use]
    pub fn new(steps: Vec<Arc<dyn Transformation>>) -> Self {
        Self(steps)
    }

    /// Returns true if the chain has no steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for TransformChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("TransformChain").field(&self.key()).finish()
    }
}

impl Transformation for TransformChain {
    fn key(&self) -> String {
        self.0
            .iter()
            .map(|t| t.key())
            .collect::<Vec<_>>()
            .join("+")
    }

    fn transform(&self, image: &DynamicImage) -> Result<DynamicImage, BoxError> {
        let mut current: Option<DynamicImage> = None;
        for step in &self.0 {
            let next = step.transform(current.as_ref().unwrap_or(image))?;
            current = Some(next);
        }
        Ok(current.unwrap_or_else(|| image.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Failing;

    impl Transformation for Failing {
        fn key(&self) -> String {
            "failing".into()
        }

        fn transform(&self, _image: &DynamicImage) -> Result<DynamicImage, BoxError> {
            Err("boom".into())
        }
    }

    #[test]
    fn test_chain_key_concatenates() {
        let chain = TransformChain::new(vec![
            Arc::new(Grayscale),
            Arc::new(Blur { sigma: 1.5 }),
        ]);
        assert_eq!(chain.key(), "grayscale+blur(1.5)");
    }

    #[test]
    fn test_chain_applies_in_order() {
        let chain = TransformChain::new(vec![
            Arc::new(Resize(Size::new(4, 2).unwrap())),
            Arc::new(Grayscale),
        ]);
        let out = chain
            .transform(&DynamicImage::new_rgb8(10, 10))
            .unwrap();
        assert_eq!((out.width(), out.height()), (4, 2));
        assert!(matches!(out, DynamicImage::ImageLuma8(_)));
    }

    #[test]
    fn test_chain_stops_at_first_failure() {
        let chain = TransformChain::new(vec![Arc::new(Failing), Arc::new(Grayscale)]);
        let err = chain.transform(&DynamicImage::new_rgb8(2, 2)).unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn test_empty_chain_is_identity() {
        let out = TransformChain::default()
            .transform(&DynamicImage::new_rgb8(3, 3))
            .unwrap();
        assert_eq!(out.width(), 3);
    }

    #[test]
    fn test_blur_rejects_negative_sigma() {
        assert!(Blur { sigma: -1.0 }.transform(&DynamicImage::new_rgb8(2, 2)).is_err());
    }
}

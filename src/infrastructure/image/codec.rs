//! Decoding and encoding helpers shared by loaders and the storage cache.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageResult};

use crate::domain::entities::Size;

/// Default JPEG quality for lossy storage.
pub const DEFAULT_JPEG_QUALITY: u8 = 85;

/// Encoding used for storage cache files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressFormat {
    /// Lossless PNG.
    #[default]
    Png,
    /// Lossy JPEG with the given quality (1-100).
    Jpeg(u8),
}

/// Decodes encoded image bytes, sniffing the format.
///
/// When `size` is given the result is downsampled to fit inside it,
/// keeping the aspect ratio. Images never get upscaled.
///
/// # Errors
/// Returns error if the format is unknown or the data is corrupt.
pub fn decode(bytes: &[u8], size: Option<Size>) -> ImageResult<DynamicImage> {
    let image = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()?
        .decode()?;
    Ok(match size {
        Some(size) => downsample(image, size),
        None => image,
    })
}

/// Shrinks an image to fit inside `size`.
#[must_use]
pub fn downsample(image: DynamicImage, size: Size) -> DynamicImage {
    if image.width() <= size.width && image.height() <= size.height {
        return image;
    }
    image.resize(size.width, size.height, FilterType::Triangle)
}

/// Encodes an image for storage.
///
/// # Errors
/// Returns error if the encoder rejects the image.
pub fn encode(image: &DynamicImage, format: CompressFormat) -> ImageResult<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    match format {
        CompressFormat::Png => image.write_to(&mut buf, ImageFormat::Png)?,
        CompressFormat::Jpeg(quality) => {
            let rgb = image.to_rgb8();
            let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100));
            encoder.encode_image(&rgb)?;
        }
    }
    Ok(buf.into_inner())
}

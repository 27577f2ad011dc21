//! Built-in loaders for every source type.

mod http;
mod local;

pub use http::{DEFAULT_MAX_BODY_BYTES, UriLoader};
pub use local::{BytesLoader, FileLoader, ResourceLoader};

use crate::domain::entities::{Size, SourceKind};

use super::codec;

/// Errors produced by the built-in loaders.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The server answered with a non-success status.
    #[error("HTTP {status} for {url}")]
    Http {
        /// Status code.
        status: u16,
        /// Requested URL.
        url: String,
    },
    /// The HTTP request itself failed.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// Reading local data failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// The bytes are not a decodable image.
    #[error("decode failed: {0}")]
    Decode(#[from] image::ImageError),
    /// The decode task did not complete.
    #[error("decode task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    /// The URI scheme is not handled.
    #[error("unsupported URI scheme: {0}")]
    UnsupportedScheme(String),
    /// The loader was handed a source of another type.
    #[error("loader cannot handle {0} sources")]
    WrongSource(SourceKind),
    /// A resource name tried to leave the resource directory.
    #[error("invalid resource name: {0}")]
    InvalidResource(String),
    /// The response body exceeded the configured cap.
    #[error("response body exceeds {limit} bytes")]
    TooLarge {
        /// Configured cap.
        limit: u64,
    },
}

/// Decodes on the blocking pool.
async fn decode_blocking(
    bytes: impl AsRef<[u8]> + Send + 'static,
    size: Option<Size>,
) -> Result<image::DynamicImage, FetchError> {
    let image =
        tokio::task::spawn_blocking(move || codec::decode(bytes.as_ref(), size)).await??;
    Ok(image)
}

//! Cache error types.

/// Result type for cache operations.
pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Errors that can occur inside the caches.
///
/// These never reach request callbacks: cache reads degrade to a miss and
/// cache writes to a no-op. Only opening a storage cache reports them.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CacheError {
    /// Failed to decode a cached image.
    #[error("Decode error: {0}")]
    DecodeError(String),
    /// Failed to encode an image for storage.
    #[error("Encode error: {0}")]
    EncodeError(String),
    /// I/O error during cache operation.
    #[error("IO error: {0}")]
    IoError(String),
}

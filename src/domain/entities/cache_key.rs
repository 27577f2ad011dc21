//! Cache key composition.

/// Required output dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Size {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Size {
    /// Creates a size, or `None` if either dimension is zero.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Option<Self> {
        if width == 0 || height == 0 {
            None
        } else {
            Some(Self { width, height })
        }
    }
}

impl std::fmt::Display for Size {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Key identifying a (data, size, transform) combination in the caches.
///
/// Variants of one image share the base key as a prefix, so removing the
/// base key by prefix drops every variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Composes the full key, or `None` when the request has no base key.
    /// An empty base key counts as none.
    #[must_use]
    pub fn compose(base: Option<&str>, size: Option<Size>, transform: Option<&str>) -> Option<Self> {
        let base = base.filter(|base| !base.is_empty())?;
        let mut key = base.to_string();
        if let Some(size) = size {
            key.push('_');
            key.push_str(&size.to_string());
        }
        if let Some(transform) = transform {
            key.push('_');
            key.push_str(transform);
        }
        Some(Self(key))
    }

    /// Builds a base key from arbitrary input by hashing it.
    #[must_use]
    pub fn hashed(input: &[u8]) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(input);
        let result = hasher.finalize();
        hex::encode(&result[..16])
    }

    /// Returns the inner string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CacheKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

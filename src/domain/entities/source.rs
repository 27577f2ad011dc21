//! Loadable sources and the descriptors built from them.

use std::path::PathBuf;

use bytes::Bytes;

/// Raw input handed to [`crate::application::ImageLoader::request`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// A URI such as `https://...` or `file:///...`.
    Uri(String),
    /// A path on the local filesystem.
    File(PathBuf),
    /// A named resource resolved by the registered resource loader.
    Resource(String),
    /// Encoded image bytes already in memory.
    Bytes(Bytes),
}

impl Source {
    /// Creates a resource source.
    #[must_use]
    pub fn resource(name: impl Into<String>) -> Self {
        Self::Resource(name.into())
    }

    /// Returns the type tag used by the request registry.
    #[must_use]
    pub const fn kind(&self) -> SourceKind {
        match self {
            Self::Uri(_) => SourceKind::Uri,
            Self::File(_) => SourceKind::File,
            Self::Resource(_) => SourceKind::Resource,
            Self::Bytes(_) => SourceKind::Bytes,
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uri(uri) => write!(f, "{uri}"),
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Resource(name) => write!(f, "res:{name}"),
            Self::Bytes(bytes) => write!(f, "<{} bytes>", bytes.len()),
        }
    }
}

impl From<&str> for Source {
    fn from(uri: &str) -> Self {
        Self::Uri(uri.to_string())
    }
}

impl From<String> for Source {
    fn from(uri: String) -> Self {
        Self::Uri(uri)
    }
}

impl From<PathBuf> for Source {
    fn from(path: PathBuf) -> Self {
        Self::File(path)
    }
}

impl From<&std::path::Path> for Source {
    fn from(path: &std::path::Path) -> Self {
        Self::File(path.to_path_buf())
    }
}

impl From<Bytes> for Source {
    fn from(bytes: Bytes) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<Vec<u8>> for Source {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(bytes))
    }
}

/// Type tag of a [`Source`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// [`Source::Uri`].
    Uri,
    /// [`Source::File`].
    File,
    /// [`Source::Resource`].
    Resource,
    /// [`Source::Bytes`].
    Bytes,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uri => write!(f, "uri"),
            Self::File => write!(f, "file"),
            Self::Resource => write!(f, "resource"),
            Self::Bytes => write!(f, "bytes"),
        }
    }
}

/// Where the data behind a descriptor lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    /// Fetched over the network.
    Remote,
    /// Already on local storage or in memory.
    Local,
}

/// Identity, payload and location of one loadable image.
///
/// Two descriptors share cache entries iff both keys are `Some` and equal.
/// A `None` key disables caching for the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataDescriptor {
    /// Payload handed to the loader.
    pub source: Source,
    /// Base cache key.
    pub key: Option<String>,
    /// Location hint used by the storage write policy.
    pub location: Location,
}

impl DataDescriptor {
    /// Creates a descriptor.
    #[must_use]
    pub fn new(source: Source, key: Option<String>, location: Location) -> Self {
        Self {
            source,
            key,
            location,
        }
    }

    /// Returns true if the descriptor points at remote data.
    #[must_use]
    pub const fn is_remote(&self) -> bool {
        matches!(self.location, Location::Remote)
    }
}

//! Domain layer with core entities, errors and port definitions.

/// Entity definitions.
pub mod entities;
/// Error types.
pub mod errors;
/// Port definitions.
pub mod ports;

pub use entities::{CacheKey, DataDescriptor, LoadedImage, Location, Size, Source, SourceKind};
pub use errors::{BoxError, CacheError, CacheResult, LoadError, RequestError};

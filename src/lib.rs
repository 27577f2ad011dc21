//! Pixload - image loading with a two-tier cache.
//!
//! Requests go through a byte-bounded memory LRU and a size-bounded
//! storage cache before reaching a loader. Every request is a cancellable
//! load action; requests bound to a view render on a single UI thread and
//! never draw over a newer request for the same view.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Application layer containing load actions and the request façade.
pub mod application;
/// Domain layer containing entities, errors, and port definitions.
pub mod domain;
/// Infrastructure layer containing caches, loaders and configuration.
pub mod infrastructure;

pub use application::{ImageLoader, RequestBuilder};
pub use domain::entities::{Source, ViewId};

/// Current version of the library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = "pixload";

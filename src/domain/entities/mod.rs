//! Domain entity definitions.

mod action;
mod cache_key;
mod image;
mod render;
mod source;

pub use action::{ActionId, ActionState, CacheMode, Checkpoint, StoragePolicy};
pub use cache_key::{CacheKey, Size};
pub use image::{ImageSource, LoadedImage, image_byte_size};
pub use render::{Drawable, RenderRequest, ViewId};
pub use source::{DataDescriptor, Location, Source, SourceKind};

mod cache_port;
mod loader_port;
mod renderer_port;
mod transformation_port;

pub use cache_port::{MemoryCachePort, StorageCachePort};
pub use loader_port::{DescriptorFactory, Loader};
pub use renderer_port::Renderer;
pub use transformation_port::Transformation;

#[cfg(test)]
pub mod mocks {
    pub use super::loader_port::MockLoader;
}

//! Default descriptor factory.

use crate::domain::entities::{CacheKey, DataDescriptor, Location, Source};
use crate::domain::ports::DescriptorFactory;

/// Keys every source by a hash of its identity.
///
/// URIs hash the URI text, files the path, resources the name and bytes
/// their content. Only `http`/`https` URIs count as remote.
#[derive(Debug, Clone, Copy, Default)]
pub struct HashedDescriptors;

impl DescriptorFactory for HashedDescriptors {
    fn describe(&self, source: Source) -> DataDescriptor {
        let (key, location) = match &source {
            Source::Uri(uri) => {
                let remote = uri.starts_with("http://") || uri.starts_with("https://");
                let location = if remote {
                    Location::Remote
                } else {
                    Location::Local
                };
                (CacheKey::hashed(uri.as_bytes()), location)
            }
            Source::File(path) => (
                format!("file_{}", CacheKey::hashed(path.as_os_str().as_encoded_bytes())),
                Location::Local,
            ),
            Source::Resource(name) => (
                format!("res_{}", CacheKey::hashed(name.as_bytes())),
                Location::Local,
            ),
            Source::Bytes(bytes) => (
                format!("mem_{}", CacheKey::hashed(bytes)),
                Location::Local,
            ),
        };
        DataDescriptor::new(source, Some(key), location)
    }
}

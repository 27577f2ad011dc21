//! Source-type registry: descriptor factory and loader per source kind.

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::entities::{Source, SourceKind};
use crate::domain::errors::RequestError;
use crate::domain::ports::{DescriptorFactory, Loader};

/// The pair of functions handling one source kind.
#[derive(Clone)]
pub struct Registration {
    /// Builds descriptors for sources of this kind.
    pub factory: Arc<dyn DescriptorFactory>,
    /// Loads images for sources of this kind.
    pub loader: Arc<dyn Loader>,
}

/// Maps source kinds to their registration.
#[derive(Clone, Default)]
pub struct Registry {
    entries: HashMap<SourceKind, Registration>,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `factory` and `loader` for `kind`, replacing any previous pair.
    pub fn register(
        &mut self,
        kind: SourceKind,
        factory: Arc<dyn DescriptorFactory>,
        loader: Arc<dyn Loader>,
    ) {
        self.entries.insert(kind, Registration { factory, loader });
    }

    /// Returns true if `kind` is registered.
    #[must_use]
    pub fn contains(&self, kind: SourceKind) -> bool {
        self.entries.contains_key(&kind)
    }

    /// Looks up the registration for `source`.
    ///
    /// # Errors
    /// Returns [`RequestError::UnsupportedSource`] if nothing is registered
    /// for the source's kind.
    pub fn resolve(&self, source: &Source) -> Result<&Registration, RequestError> {
        let kind = source.kind();
        self.entries
            .get(&kind)
            .ok_or(RequestError::UnsupportedSource(kind))
    }

    /// Merges `other` into this registry; entries in `other` win.
    pub fn extend(&mut self, other: Self) {
        self.entries.extend(other.entries);
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.entries.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::mocks::MockLoader;
    use crate::infrastructure::image::HashedDescriptors;

    #[test]
    fn test_resolve_registered_kind() {
        let mut registry = Registry::new();
        registry.register(SourceKind::Uri, Arc::new(HashedDescriptors), Arc::new(MockLoader::new()));

        assert!(registry.contains(SourceKind::Uri));
        assert!(registry.resolve(&Source::from("https://x/y.png")).is_ok());
    }

    #[test]
    fn test_unregistered_kind_is_unsupported() {
        let registry = Registry::new();
        let err = registry.resolve(&Source::resource("logo")).err();

        assert!(matches!(err, Some(RequestError::UnsupportedSource(SourceKind::Resource))));
        assert_eq!(
            err.map(|e| e.to_string()).as_deref(),
            Some("unsupported source type: resource")
        );
    }

    #[test]
    fn test_extend_overrides() {
        let mut registry = Registry::new();
        registry.register(SourceKind::File, Arc::new(HashedDescriptors), Arc::new(MockLoader::new()));

        let mut other = Registry::new();
        other.register(SourceKind::Bytes, Arc::new(HashedDescriptors), Arc::new(MockLoader::new()));
        registry.extend(other);

        assert!(registry.contains(SourceKind::File));
        assert!(registry.contains(SourceKind::Bytes));
    }
}

//! Load and request error types.

use std::sync::Arc;

use thiserror::Error;

use crate::domain::entities::SourceKind;

/// Boxed error returned by loaders and transformations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Terminal failure of a load action. None of these are retried.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The loader returned an error; it is kept as-is.
    #[error("loader failed: {source}")]
    Failed {
        #[source]
        source: BoxError,
    },

    /// The loader finished without an image and without an error.
    #[error("image not loaded")]
    NotLoaded,

    /// The transformation returned an error.
    #[error("transformation {key} failed: {source}")]
    Transform {
        /// Key of the failing transformation.
        key: String,
        #[source]
        source: BoxError,
    },
}

impl LoadError {
    /// Wraps a loader error.
    #[must_use]
    pub fn failed(source: impl Into<BoxError>) -> Self {
        Self::Failed {
            source: source.into(),
        }
    }

    /// Wraps a transformation error.
    #[must_use]
    pub fn transform(key: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Transform {
            key: key.into(),
            source: source.into(),
        }
    }

    /// Returns the loader or transformation error, if any.
    #[must_use]
    pub fn origin(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            Self::Failed { source } | Self::Transform { source, .. } => Some(source.as_ref()),
            Self::NotLoaded => None,
        }
    }

    /// Returns whether the loader returned nothing.
    #[must_use]
    pub const fn is_not_loaded(&self) -> bool {
        matches!(self, Self::NotLoaded)
    }
}

/// Errors surfaced by the request façade.
#[derive(Debug, Clone, Error)]
pub enum RequestError {
    /// No descriptor factory and loader are registered for this source type.
    #[error("unsupported source type: {0}")]
    UnsupportedSource(SourceKind),

    /// The load action ended with an error.
    #[error(transparent)]
    Load(Arc<LoadError>),

    /// The load action was cancelled before delivery.
    #[error("request cancelled")]
    Cancelled,
}

impl From<LoadError> for RequestError {
    fn from(err: LoadError) -> Self {
        Self::Load(Arc::new(err))
    }
}

//! Loaders for files, in-memory bytes and named resources.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tracing::trace;

use super::{FetchError, decode_blocking};
use crate::domain::entities::{Size, Source};
use crate::domain::errors::BoxError;
use crate::domain::ports::Loader;

/// Reads and decodes files from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileLoader;

#[async_trait]
impl Loader for FileLoader {
    async fn load(
        &self,
        source: &Source,
        size: Option<Size>,
    ) -> Result<Option<image::DynamicImage>, BoxError> {
        let Source::File(path) = source else {
            return Err(FetchError::WrongSource(source.kind()).into());
        };
        trace!(path = %path.display(), "Reading image file");
        let bytes = tokio::fs::read(path).await.map_err(FetchError::from)?;
        Ok(Some(decode_blocking(bytes, size).await?))
    }
}

/// Decodes encoded bytes held in memory. Empty input loads nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct BytesLoader;

#[async_trait]
impl Loader for BytesLoader {
    async fn load(
        &self,
        source: &Source,
        size: Option<Size>,
    ) -> Result<Option<image::DynamicImage>, BoxError> {
        let Source::Bytes(bytes) = source else {
            return Err(FetchError::WrongSource(source.kind()).into());
        };
        if bytes.is_empty() {
            return Ok(None);
        }
        Ok(Some(decode_blocking(bytes.clone(), size).await?))
    }
}

/// Resolves resource names to files under a root directory.
#[derive(Debug, Clone)]
pub struct ResourceLoader {
    root: PathBuf,
}

impl ResourceLoader {
    /// Creates a loader rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, name: &str) -> Result<PathBuf, FetchError> {
        let relative = Path::new(name);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if name.is_empty() || escapes {
            return Err(FetchError::InvalidResource(name.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl Loader for ResourceLoader {
    async fn load(
        &self,
        source: &Source,
        size: Option<Size>,
    ) -> Result<Option<image::DynamicImage>, BoxError> {
        let Source::Resource(name) = source else {
            return Err(FetchError::WrongSource(source.kind()).into());
        };
        let path = self.resolve(name)?;
        let bytes = tokio::fs::read(&path).await.map_err(FetchError::from)?;
        Ok(Some(decode_blocking(bytes, size).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::image::codec::{CompressFormat, encode};

    fn png(width: u32, height: u32) -> Vec<u8> {
        encode(&image::DynamicImage::new_rgb8(width, height), CompressFormat::Png).unwrap()
    }

    #[tokio::test]
    async fn test_file_loader() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.png");
        std::fs::write(&path, png(5, 7)).unwrap();

        let image = FileLoader.load(&Source::File(path), None).await.unwrap().unwrap();
        assert_eq!((image.width(), image.height()), (5, 7));
    }

    #[tokio::test]
    async fn test_file_loader_missing_file_keeps_io_error() {
        let err = FileLoader
            .load(&Source::File(PathBuf::from("/definitely/not/here.png")), None)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<FetchError>(),
            Some(FetchError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound
        ));
    }

    #[tokio::test]
    async fn test_bytes_loader() {
        let image = BytesLoader
            .load(&Source::from(png(3, 3)), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(image.width(), 3);
    }

    #[tokio::test]
    async fn test_bytes_loader_empty_loads_nothing() {
        let result = BytesLoader.load(&Source::from(Vec::<u8>::new()), None).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_resource_loader() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("icons")).unwrap();
        std::fs::write(dir.path().join("icons/logo.png"), png(4, 4)).unwrap();

        let loader = ResourceLoader::new(dir.path());
        let image = loader
            .load(&Source::resource("icons/logo.png"), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(image.height(), 4);
    }

    #[tokio::test]
    async fn test_resource_loader_rejects_traversal() {
        let loader = ResourceLoader::new("/tmp");
        let err = loader
            .load(&Source::resource("../etc/passwd"), None)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<FetchError>(),
            Some(FetchError::InvalidResource(_))
        ));
    }
}

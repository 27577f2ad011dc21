//! Loader for `http`, `https` and `file` URIs.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use tracing::debug;

use super::{FetchError, decode_blocking};
use crate::domain::entities::{Size, Source};
use crate::domain::errors::BoxError;
use crate::domain::ports::Loader;

/// Default cap on downloaded bodies (32 MiB).
pub const DEFAULT_MAX_BODY_BYTES: u64 = 32 * 1024 * 1024;

const USER_AGENT: &str = concat!("pixload/", env!("CARGO_PKG_VERSION"));

/// Fetches URIs over HTTP(S) or from the filesystem and decodes them.
#[derive(Debug, Clone)]
pub struct UriLoader {
    client: Client,
    max_body_bytes: u64,
}

impl UriLoader {
    /// Creates a loader with its own HTTP client.
    ///
    /// # Errors
    /// Returns error if HTTP client creation fails.
    pub fn new(timeout: Duration, max_body_bytes: u64) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self::with_client(client, max_body_bytes))
    }

    /// Creates a loader around an existing client.
    #[must_use]
    pub const fn with_client(client: Client, max_body_bytes: u64) -> Self {
        Self {
            client,
            max_body_bytes,
        }
    }

    /// Downloads a body, enforcing the size cap while streaming.
    async fn download(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        debug!(url = %url, "Downloading image");
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let limit = self.max_body_bytes;
        if response.content_length().is_some_and(|len| len > limit) {
            return Err(FetchError::TooLarge { limit });
        }

        let mut body = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if (body.len() + chunk.len()) as u64 > limit {
                return Err(FetchError::TooLarge { limit });
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }
}

#[async_trait]
impl Loader for UriLoader {
    async fn load(
        &self,
        source: &Source,
        size: Option<Size>,
    ) -> Result<Option<image::DynamicImage>, BoxError> {
        let Source::Uri(uri) = source else {
            return Err(FetchError::WrongSource(source.kind()).into());
        };

        let bytes = if let Some(path) = uri.strip_prefix("file://") {
            tokio::fs::read(path).await.map_err(FetchError::from)?
        } else if uri.starts_with("http://") || uri.starts_with("https://") {
            self.download(uri).await?
        } else {
            let scheme = uri.split_once(':').map_or("", |(scheme, _)| scheme);
            return Err(FetchError::UnsupportedScheme(scheme.to_string()).into());
        };

        Ok(Some(decode_blocking(bytes, size).await?))
    }
}

//! HTTP retrieval of images to run OCR on.

use async_trait::async_trait;
use reqwest::Url;
use tracing::{info, warn};

use crate::OcrError;

/// Source of raw image bytes.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, OcrError>;
}

/// Largest image body read by default: 20 MiB.
pub const DEFAULT_MAX_IMAGE_BYTES: u64 = 20 * 1024 * 1024;

/// Fetches images over HTTP(S). No retries: a failure is reported as-is.
///
/// Bodies larger than `max_bytes` are refused, up front when the server
/// announces a `Content-Length`, otherwise as soon as the limit is crossed.
#[derive(Debug, Clone)]
pub struct HttpImageFetcher {
    client: reqwest::Client,
    max_bytes: u64,
}

impl Default for HttpImageFetcher {
    fn default() -> Self {
        Self::with_client(reqwest::Client::new())
    }
}

impl HttpImageFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            max_bytes: DEFAULT_MAX_IMAGE_BYTES,
        }
    }

    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }
}

/// Parse an image URL, accepting only `http` and `https`.
pub fn parse_image_url(url: &str) -> Result<Url, OcrError> {
    let parsed = Url::parse(url.trim()).map_err(|e| OcrError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        scheme => Err(OcrError::InvalidUrl {
            url: url.to_string(),
            reason: format!("unsupported scheme {scheme:?}"),
        }),
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, OcrError> {
        let parsed = parse_image_url(url)?;

        info!(url = %parsed, "fetching image");
        let mut resp = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| OcrError::Fetch {
                url: url.to_string(),
                status: None,
                reason: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            warn!(url, status = status.as_u16(), "image fetch rejected");
            return Err(OcrError::Fetch {
                url: url.to_string(),
                status: Some(status.as_u16()),
                reason: format!("server returned {status}"),
            });
        }

        let too_large = |status: u16| OcrError::Fetch {
            url: url.to_string(),
            status: Some(status),
            reason: format!("image larger than {} bytes", self.max_bytes),
        };

        if resp.content_length().is_some_and(|len| len > self.max_bytes) {
            warn!(url, limit = self.max_bytes, "image too large");
            return Err(too_large(status.as_u16()));
        }

        let mut bytes = Vec::new();
        while let Some(chunk) = resp.chunk().await.map_err(|e| OcrError::Fetch {
            url: url.to_string(),
            status: Some(status.as_u16()),
            reason: e.to_string(),
        })? {
            if (bytes.len() + chunk.len()) as u64 > self.max_bytes {
                warn!(url, limit = self.max_bytes, "image too large");
                return Err(too_large(status.as_u16()));
            }
            bytes.extend_from_slice(&chunk);
        }
        info!(url, bytes = bytes.len(), "fetched image");
        Ok(bytes)
    }
}

// Link content fetching: learns what a link really points at.
//
// URL extensions can't be trusted, so every item is fetched and its
// Content-Type decides whether it is treated as an image. The decision is
// made once, here, as a closed ContentKind.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use tracing::debug;

use crate::error::FetchError;

/// What a fetched item is, as far as duplicate detection cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Image { animated: bool },
    NonImage,
}

impl ContentKind {
    /// Classify a Content-Type header value. Parameters (`; charset=...`)
    /// and case are ignored. `image/gif` is the animated sub-type.
    pub fn from_content_type(content_type: &str) -> Self {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match essence.strip_prefix("image/") {
            Some(subtype) => ContentKind::Image {
                animated: subtype == "gif",
            },
            None => ContentKind::NonImage,
        }
    }

    pub fn is_image(self) -> bool {
        matches!(self, ContentKind::Image { .. })
    }
}

/// A successfully fetched item.
#[derive(Debug, Clone)]
pub struct FetchedContent {
    pub kind: ContentKind,
    /// Response body. Only read for images; empty otherwise.
    pub body: Vec<u8>,
}

/// Fetch collaborator. One attempt per call, no retries.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedContent, FetchError>;
}

/// reqwest-backed fetcher.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("recycler/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {e}"))?;
        Ok(Self { client })
    }
}

fn request_error(url: &str, e: reqwest::Error) -> FetchError {
    FetchError::Request {
        url: url.to_string(),
        cause: e.to_string(),
    }
}

#[async_trait]
impl ContentFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedContent, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| request_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let kind = ContentKind::from_content_type(&content_type);
        debug!(url, content_type = %content_type, "Fetched link");

        let body = if kind.is_image() {
            response
                .bytes()
                .await
                .map_err(|e| request_error(url, e))?
                .to_vec()
        } else {
            Vec::new()
        };

        Ok(FetchedContent { kind, body })
    }
}

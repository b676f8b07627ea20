//! Direct fetch: plain HTTP GET of the target URL

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use std::time::{Duration, Instant};

use super::{ImageResponse, Transport};
use crate::constants::DEFAULT_MAX_BODY_SIZE_MB;
use crate::error::ProxyError;
use crate::request::ImageRequest;

/// Default body cap in bytes
pub const DEFAULT_MAX_BODY_BYTES: u64 = DEFAULT_MAX_BODY_SIZE_MB * 1024 * 1024;

/// Bottom of the chain in direct mode
///
/// Any response status is returned as-is; judging it is up to the callers.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    max_body_bytes: u64,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, ProxyError> {
        Ok(Self::with_client(build_client(timeout)?))
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    /// Reject bodies larger than `max_body_bytes` (0 = unbounded)
    pub fn with_body_limit(mut self, max_body_bytes: u64) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }
}

/// Read a whole response body, failing as soon as it exceeds `limit` bytes
///
/// A declared Content-Length over the limit fails before anything is read.
/// `limit` 0 means unbounded.
pub async fn read_body(mut response: reqwest::Response, limit: u64) -> Result<Bytes, ProxyError> {
    if limit == 0 {
        return Ok(response.bytes().await?);
    }

    let url = response.url().clone();
    let too_large = || {
        ProxyError::upstream(format!(
            "response body from {} exceeds {} bytes",
            url, limit
        ))
    };

    if response.content_length().is_some_and(|len| len > limit) {
        return Err(too_large());
    }

    let mut body = BytesMut::new();
    while let Some(chunk) = response.chunk().await? {
        if (body.len() + chunk.len()) as u64 > limit {
            return Err(too_large());
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body.freeze())
}

/// Shared outbound client settings
pub fn build_client(timeout: Duration) -> Result<reqwest::Client, ProxyError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("kagami/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ProxyError::Internal(format!("failed to build HTTP client: {}", e)))
}

#[async_trait]
impl Transport for HttpFetcher {
    async fn round_trip(&self, request: &ImageRequest) -> Result<ImageResponse, ProxyError> {
        let start = Instant::now();
        tracing::debug!(url = %request.url, "Fetching remote URL");

        let response = self.client.get(request.url.clone()).send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = read_body(response, self.max_body_bytes).await?;

        tracing::debug!(
            url = %request.url,
            status_code = status.as_u16(),
            bytes = body.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Fetched remote URL"
        );

        Ok(ImageResponse::new(status, headers, body))
    }
}

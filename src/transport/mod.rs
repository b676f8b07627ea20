//! Fetch chain
//!
//! Every layer implements [`Transport`] and holds the next one:
//!
//! ```text
//! CachingTransport -> TransformingTransport -> HttpFetcher | ObjectStoreFetcher
//! ```
//!
//! The caching layer is left out entirely when caching is disabled.

pub mod caching;
pub mod fetch;
pub mod transform;

pub use caching::CachingTransport;
pub use fetch::HttpFetcher;
pub use transform::TransformingTransport;

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{CONTENT_LENGTH, TRANSFER_ENCODING};
use http::{HeaderMap, HeaderValue, StatusCode};
use std::sync::Arc;
use std::time::Duration;

use crate::cache::Cache;
use crate::error::ProxyError;
use crate::request::ImageRequest;

/// One link of the chain: turn a request into a fully buffered response
#[async_trait]
pub trait Transport: Send + Sync {
    async fn round_trip(&self, request: &ImageRequest) -> Result<ImageResponse, ProxyError>;
}

/// A fetched (and possibly transformed) response
#[derive(Debug, Clone, PartialEq)]
pub struct ImageResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ImageResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// 200 with a body and a matching Content-Length
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self::new(StatusCode::OK, HeaderMap::new(), Bytes::new()).with_body(body.into())
    }

    /// Header value as text; `None` if absent or not visible ASCII
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// e.g. `404 Not Found`
    pub fn status_line(&self) -> String {
        match self.status.canonical_reason() {
            Some(reason) => format!("{} {}", self.status.as_u16(), reason),
            None => self.status.as_u16().to_string(),
        }
    }

    /// Replace the body and fix the framing headers to match it
    pub fn with_body(mut self, body: Bytes) -> Self {
        self.headers.remove(TRANSFER_ENCODING);
        self.headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
        self.body = body;
        self
    }
}

/// Stack the layers above `fetcher`
pub fn build_chain(
    fetcher: Arc<dyn Transport>,
    cache: Option<Arc<dyn Cache>>,
    default_ttl: Duration,
) -> Arc<dyn Transport> {
    let transforming: Arc<dyn Transport> = Arc::new(TransformingTransport::new(fetcher));
    match cache {
        Some(cache) => Arc::new(CachingTransport::new(transforming, cache, default_ttl)),
        None => transforming,
    }
}

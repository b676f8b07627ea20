//! Transform layer
//!
//! Fetches the bare URL from the next layer and runs the image engine over the
//! body. Untransformed requests and non-200 responses pass through as fetched.

use async_trait::async_trait;
use http::StatusCode;
use std::sync::Arc;
use std::time::Instant;

use super::{ImageResponse, Transport};
use crate::error::ProxyError;
use crate::image_transform;
use crate::options::TransformOptions;
use crate::request::ImageRequest;

pub struct TransformingTransport {
    inner: Arc<dyn Transport>,
}

impl TransformingTransport {
    pub fn new(inner: Arc<dyn Transport>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl Transport for TransformingTransport {
    async fn round_trip(&self, request: &ImageRequest) -> Result<ImageResponse, ProxyError> {
        if request.options.is_empty() {
            return self.inner.round_trip(request).await;
        }

        let bare = ImageRequest::new(request.url.clone(), TransformOptions::EMPTY);
        let response = self.inner.round_trip(&bare).await?;
        if response.status != StatusCode::OK {
            return Ok(response);
        }

        let start = Instant::now();
        match image_transform::transform(response.body.clone(), &request.options).await {
            Ok(body) => {
                tracing::debug!(
                    url = %request.url,
                    directives = %request.options,
                    original_bytes = response.body.len(),
                    transformed_bytes = body.len(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Transformed image"
                );
                Ok(response.with_body(body))
            }
            Err(e) => {
                tracing::warn!(
                    url = %request.url,
                    directives = %request.options,
                    error = %e,
                    error_kind = e.kind(),
                    "Image transform failed, serving original"
                );
                let body = response.body.clone();
                Ok(response.with_body(body))
            }
        }
    }
}

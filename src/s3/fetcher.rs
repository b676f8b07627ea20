//! Signed object-storage fetch: bottom of the chain in backend mode

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use http::header::{CACHE_CONTROL, EXPIRES, HOST};
use http::{HeaderMap, HeaderValue, StatusCode};
use std::time::Instant;

use super::{BackendEndpoint, Credentials, SignedRequest, RFC1123_FORMAT};
use crate::constants::{BACKEND_CACHE_CONTROL, BACKEND_EXPIRES_DAYS};
use crate::error::ProxyError;
use crate::request::ImageRequest;
use crate::transport::fetch::{read_body, DEFAULT_MAX_BODY_BYTES};
use crate::transport::{ImageResponse, Transport};

pub struct ObjectStoreFetcher {
    client: reqwest::Client,
    endpoint: BackendEndpoint,
    credentials: Credentials,
    max_body_bytes: u64,
}

impl ObjectStoreFetcher {
    pub fn new(client: reqwest::Client, endpoint: BackendEndpoint, credentials: Credentials) -> Self {
        Self {
            client,
            endpoint,
            credentials,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    /// Reject objects larger than `max_body_bytes` (0 = unbounded)
    pub fn with_body_limit(mut self, max_body_bytes: u64) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    pub fn endpoint(&self) -> &BackendEndpoint {
        &self.endpoint
    }
}

#[async_trait]
impl Transport for ObjectStoreFetcher {
    async fn round_trip(&self, request: &ImageRequest) -> Result<ImageResponse, ProxyError> {
        let start = Instant::now();
        let now = Utc::now();
        // Signed per attempt; nothing is reused across fetches
        let signed = SignedRequest::get(&self.endpoint, &request.url, &[], &self.credentials, now)?;

        let mut builder = self.client.get(request.url.clone());
        for (name, value) in &signed.headers {
            // reqwest derives Host from the URL
            if name != HOST.as_str() {
                builder = builder.header(name.as_str(), value.as_str());
            }
        }

        tracing::debug!(
            bucket = %signed.bucket,
            path = %signed.path,
            "Fetching object from backend"
        );

        let response = builder.send().await?;
        let status = response.status();
        if status != StatusCode::OK && status != StatusCode::NO_CONTENT {
            tracing::warn!(
                bucket = %signed.bucket,
                path = %signed.path,
                status_code = status.as_u16(),
                "Backend rejected object request"
            );
            return Err(ProxyError::upstream_status(
                status.as_u16(),
                format!(
                    "Backend returned status {} for {}",
                    status, signed.path
                ),
            ));
        }

        let headers = response.headers().clone();
        let body = read_body(response, self.max_body_bytes).await?;

        tracing::debug!(
            bucket = %signed.bucket,
            path = %signed.path,
            bytes = body.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Fetched object from backend"
        );

        Ok(far_future_response(headers, body, now))
    }
}

/// Rebuild a backend response as an immutable 200
///
/// Objects are assumed never to change under the same path, so the response
/// gets an `Expires` ten years after `now` and a matching Cache-Control.
pub fn far_future_response(headers: HeaderMap, body: Bytes, now: DateTime<Utc>) -> ImageResponse {
    let mut response = ImageResponse::new(StatusCode::OK, headers, Bytes::new()).with_body(body);

    let expires = (now + ChronoDuration::days(BACKEND_EXPIRES_DAYS))
        .format(RFC1123_FORMAT)
        .to_string();
    if let Ok(value) = HeaderValue::from_str(&expires) {
        response.headers.insert(EXPIRES, value);
    }
    response
        .headers
        .insert(CACHE_CONTROL, HeaderValue::from_static(BACKEND_CACHE_CONTROL));
    response
}

//! Caching layer
//!
//! Outermost link of the chain. Responses are keyed by `URL#directives`, so a
//! hit skips both the fetch and the transform. Only 200 responses that
//! Cache-Control allows a shared cache to keep are stored.
//!
//! Cache failures never fail a request: a read error is a miss and a write
//! error only means the response is not stored.
//!
//! Every [`CACHE_STATS_LOG_INTERVAL`] requests the cache statistics are
//! logged at info level.

use async_trait::async_trait;
use http::header::CACHE_CONTROL;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::{ImageResponse, Transport};
use crate::cache::{Cache, CacheControl, CacheEntry, CacheStats};
use crate::constants::{CACHE_STATS_LOG_INTERVAL, FROM_CACHE_HEADER};
use crate::error::ProxyError;
use crate::request::ImageRequest;

/// Result of a cache lookup
#[derive(Debug)]
pub enum CacheLookup {
    Hit(ImageResponse),
    Miss,
    /// Lookup failed; treated as a miss
    Error(String),
}

pub struct CachingTransport {
    inner: Arc<dyn Transport>,
    cache: Arc<dyn Cache>,
    default_ttl: Duration,
    requests: AtomicU64,
}

impl CachingTransport {
    pub fn new(inner: Arc<dyn Transport>, cache: Arc<dyn Cache>, default_ttl: Duration) -> Self {
        Self {
            inner,
            cache,
            default_ttl,
            requests: AtomicU64::new(0),
        }
    }

    /// Log the current cache statistics and return them
    pub async fn report_stats(&self) -> Option<CacheStats> {
        self.cache.run_pending_tasks().await;
        match self.cache.stats().await {
            Ok(stats) => {
                tracing::info!(
                    hits = stats.hits,
                    misses = stats.misses,
                    hit_rate = stats.hit_rate(),
                    evictions = stats.evictions,
                    items = stats.current_item_count,
                    size_bytes = stats.current_size_bytes,
                    max_size_bytes = stats.max_size_bytes,
                    "Cache statistics"
                );
                Some(stats)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read cache statistics");
                None
            }
        }
    }

    pub async fn lookup(&self, key: &str) -> CacheLookup {
        match self.cache.get(key).await {
            Ok(Some(entry)) => match response_from_entry(entry) {
                Ok(response) => CacheLookup::Hit(response),
                Err(message) => CacheLookup::Error(message),
            },
            Ok(None) => CacheLookup::Miss,
            Err(e) => CacheLookup::Error(e.to_string()),
        }
    }

    async fn store(&self, key: String, response: &ImageResponse) {
        let Some(ttl) = storable_ttl(response, self.default_ttl) else {
            tracing::debug!(key = %key, status_code = response.status.as_u16(), "Response not cacheable");
            return;
        };

        let entry = entry_from_response(response, ttl);
        if let Err(e) = self.cache.set(key.clone(), entry).await {
            tracing::warn!(key = %key, error = %e, "Failed to store response in cache");
        }
    }
}

#[async_trait]
impl Transport for CachingTransport {
    async fn round_trip(&self, request: &ImageRequest) -> Result<ImageResponse, ProxyError> {
        let key = request.cache_key();
        let seen = self.requests.fetch_add(1, Ordering::Relaxed) + 1;
        if seen % CACHE_STATS_LOG_INTERVAL == 0 {
            self.report_stats().await;
        }

        match self.lookup(&key).await {
            CacheLookup::Hit(response) => {
                tracing::debug!(key = %key, "Cache hit");
                return Ok(response);
            }
            CacheLookup::Miss => tracing::debug!(key = %key, "Cache miss"),
            CacheLookup::Error(message) => {
                tracing::warn!(key = %key, error = %message, "Cache lookup failed, fetching")
            }
        }

        let response = self.inner.round_trip(request).await?;
        self.store(key, &response).await;
        Ok(response)
    }
}

/// Lifetime to store `response` for, or `None` if it must not be stored
pub fn storable_ttl(response: &ImageResponse, default_ttl: Duration) -> Option<Duration> {
    if response.status != StatusCode::OK {
        return None;
    }

    let cc = response
        .header(CACHE_CONTROL.as_str())
        .map(CacheControl::parse)
        .unwrap_or_default();
    if !cc.should_store() {
        return None;
    }

    let ttl = cc.effective_ttl(default_ttl);
    (!ttl.is_zero()).then_some(ttl)
}

fn entry_from_response(response: &ImageResponse, ttl: Duration) -> CacheEntry {
    let headers = response
        .headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();
    CacheEntry::new(
        response.status.as_u16(),
        headers,
        response.body.clone(),
        ttl,
    )
}

fn response_from_entry(entry: CacheEntry) -> Result<ImageResponse, String> {
    let status = StatusCode::from_u16(entry.status)
        .map_err(|_| format!("invalid cached status {}", entry.status))?;

    let mut headers = HeaderMap::with_capacity(entry.headers.len() + 1);
    for (name, value) in &entry.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| format!("invalid cached header name {:?}: {}", name, e))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| format!("invalid cached header value: {}", e))?;
        headers.append(name, value);
    }
    headers.insert(FROM_CACHE_HEADER, HeaderValue::from_static("1"));

    Ok(ImageResponse::new(status, headers, entry.body))
}

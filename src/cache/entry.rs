//! Cache entry type
//!
//! A stored response: status, the headers needed to rebuild it, the body,
//! and the lifetime bookkeeping used for expiry.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};

/// Lifetime used when the requested one overflows the system clock
pub const MAX_ENTRY_TTL: Duration = Duration::from_secs(1 << 31);

/// A cached response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub status: u16,
    /// Header name/value pairs in the order they were received
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub created_at: SystemTime,
    pub expires_at: SystemTime,
}

impl CacheEntry {
    /// Create an entry that expires `ttl` from now
    ///
    /// A `ttl` too large for the clock expires after [`MAX_ENTRY_TTL`] instead.
    pub fn new(status: u16, headers: Vec<(String, String)>, body: Bytes, ttl: Duration) -> Self {
        let now = SystemTime::now();
        let expires_at = now
            .checked_add(ttl)
            .unwrap_or_else(|| now + MAX_ENTRY_TTL);
        Self {
            status,
            headers,
            body,
            created_at: now,
            expires_at,
        }
    }

    pub fn is_expired(&self) -> bool {
        SystemTime::now() >= self.expires_at
    }

    /// Remaining lifetime, zero once expired
    pub fn time_to_live(&self) -> Duration {
        self.expires_at
            .duration_since(SystemTime::now())
            .unwrap_or(Duration::ZERO)
    }

    /// Approximate footprint in bytes (body plus header text)
    pub fn size_bytes(&self) -> usize {
        self.body.len()
            + self
                .headers
                .iter()
                .map(|(k, v)| k.len() + v.len())
                .sum::<usize>()
    }

    /// Split into the on-disk metadata record and the body
    pub fn into_parts(self) -> (CacheMeta, Bytes) {
        let meta = CacheMeta {
            status: self.status,
            headers: self.headers,
            content_length: self.body.len(),
            created_at: self.created_at,
            expires_at: self.expires_at,
        };
        (meta, self.body)
    }

    pub fn from_parts(meta: CacheMeta, body: Bytes) -> Self {
        Self {
            status: meta.status,
            headers: meta.headers,
            body,
            created_at: meta.created_at,
            expires_at: meta.expires_at,
        }
    }
}

/// Everything about an entry except its body, serialized as JSON by the disk cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheMeta {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub content_length: usize,
    pub created_at: SystemTime,
    pub expires_at: SystemTime,
}

impl CacheMeta {
    pub fn is_expired(&self) -> bool {
        SystemTime::now() >= self.expires_at
    }
}

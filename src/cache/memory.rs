//! Memory cache implementation backed by moka

use async_trait::async_trait;
use moka::notification::RemovalCause;
use moka::Expiry;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::entry::CacheEntry;
use super::error::CacheError;
use super::stats::{CacheStats, CacheStatsTracker};
use super::traits::Cache;

/// Each entry lives for the lifetime it was stored with
struct EntryExpiry;

impl Expiry<String, CacheEntry> for EntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CacheEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.time_to_live())
    }
}

/// In-process cache bounded by total entry size
pub struct MemoryCache {
    cache: moka::future::Cache<String, CacheEntry>,
    stats: Arc<CacheStatsTracker>,
    max_size_bytes: u64,
}

impl MemoryCache {
    pub fn new(max_size_bytes: u64) -> Self {
        let stats = Arc::new(CacheStatsTracker::new());
        let stats_clone = stats.clone();

        let cache = moka::future::Cache::builder()
            .max_capacity(max_size_bytes)
            .weigher(|_key: &String, entry: &CacheEntry| {
                u32::try_from(entry.size_bytes()).unwrap_or(u32::MAX)
            })
            .expire_after(EntryExpiry)
            .eviction_listener(move |_key, _value, cause| {
                // Explicit invalidation is not an eviction
                if matches!(cause, RemovalCause::Size | RemovalCause::Expired) {
                    stats_clone.increment_evictions();
                }
            })
            .build();

        Self {
            cache,
            stats,
            max_size_bytes,
        }
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        match self.cache.get(key).await {
            Some(entry) if !entry.is_expired() => {
                self.stats.increment_hits();
                Ok(Some(entry))
            }
            Some(_) => {
                self.cache.invalidate(key).await;
                self.stats.increment_misses();
                Ok(None)
            }
            None => {
                self.stats.increment_misses();
                Ok(None)
            }
        }
    }

    async fn set(&self, key: String, entry: CacheEntry) -> Result<(), CacheError> {
        if entry.size_bytes() as u64 > self.max_size_bytes {
            return Err(CacheError::StorageFull);
        }
        self.cache.insert(key, entry).await;
        Ok(())
    }

    async fn stats(&self) -> Result<CacheStats, CacheError> {
        Ok(self.stats.snapshot(
            self.cache.weighted_size(),
            self.cache.entry_count(),
            self.max_size_bytes,
        ))
    }

    async fn run_pending_tasks(&self) {
        self.cache.run_pending_tasks().await;
    }
}

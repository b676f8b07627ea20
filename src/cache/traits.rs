//! Cache trait definition
//!
//! Common interface for the memory and disk caches. Implementations must be
//! safe for concurrent use; callers add no locking of their own.

use async_trait::async_trait;

use super::entry::CacheEntry;
use super::error::CacheError;
use super::stats::CacheStats;

/// Response store keyed by `URL#directives`
#[async_trait]
pub trait Cache: Send + Sync {
    /// Get an entry; `None` if absent or expired
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError>;

    /// Store an entry, replacing any previous one for `key`
    async fn set(&self, key: String, entry: CacheEntry) -> Result<(), CacheError>;

    async fn stats(&self) -> Result<CacheStats, CacheError>;

    /// Run pending maintenance (moka housekeeping). No-op by default.
    async fn run_pending_tasks(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct MapCache {
        entries: Mutex<HashMap<String, CacheEntry>>,
    }

    #[async_trait]
    impl Cache for MapCache {
        async fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
            Ok(self.entries.lock().unwrap().get(key).cloned())
        }

        async fn set(&self, key: String, entry: CacheEntry) -> Result<(), CacheError> {
            self.entries.lock().unwrap().insert(key, entry);
            Ok(())
        }

        async fn stats(&self) -> Result<CacheStats, CacheError> {
            Ok(CacheStats {
                current_item_count: self.entries.lock().unwrap().len() as u64,
                ..Default::default()
            })
        }
    }

    #[tokio::test]
    async fn test_trait_object_round_trip() {
        let cache: Box<dyn Cache> = Box::new(MapCache::default());
        let entry = CacheEntry::new(200, vec![], Bytes::from_static(b"x"), Duration::from_secs(5));

        cache.set("k".to_string(), entry.clone()).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some(entry));
        assert_eq!(cache.get("other").await.unwrap(), None);
        cache.run_pending_tasks().await;
        assert_eq!(cache.stats().await.unwrap().current_item_count, 1);
    }

    #[test]
    fn test_trait_object_is_send_sync() {
        fn assert_send_sync<T: Send + Sync + ?Sized>() {}
        assert_send_sync::<dyn Cache>();
    }
}

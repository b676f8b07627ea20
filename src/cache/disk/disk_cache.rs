//! Main DiskCache implementation

use async_trait::async_trait;
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::utils::{generate_paths, key_to_hash, remove_if_exists, write_file_atomic};
use crate::cache::entry::{CacheEntry, CacheMeta};
use crate::cache::error::CacheError;
use crate::cache::stats::{CacheStats, CacheStatsTracker};
use crate::cache::traits::Cache;

/// Persistent cache rooted at a directory
pub struct DiskCache {
    entries_dir: PathBuf,
    stats: Arc<CacheStatsTracker>,
}

impl DiskCache {
    /// Create the cache, making `{cache_dir}/entries` if needed
    pub async fn new(cache_dir: impl AsRef<Path>) -> Result<Self, CacheError> {
        let entries_dir = cache_dir.as_ref().join("entries");
        tokio::fs::create_dir_all(&entries_dir).await?;
        Ok(Self {
            entries_dir,
            stats: Arc::new(CacheStatsTracker::new()),
        })
    }

    pub fn entries_dir(&self) -> &Path {
        &self.entries_dir
    }

    fn paths(&self, key: &str) -> (PathBuf, PathBuf) {
        generate_paths(&self.entries_dir, &key_to_hash(key))
    }

    async fn read_meta(path: &Path) -> Result<Option<CacheMeta>, CacheError> {
        match tokio::fs::read(path).await {
            Ok(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn remove_pair(data_path: &Path, meta_path: &Path) -> Result<bool, CacheError> {
        let meta_removed = remove_if_exists(meta_path).await?;
        let data_removed = remove_if_exists(data_path).await?;
        Ok(meta_removed || data_removed)
    }

    async fn miss(&self) -> Result<Option<CacheEntry>, CacheError> {
        self.stats.increment_misses();
        Ok(None)
    }
}

#[async_trait]
impl Cache for DiskCache {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        let (data_path, meta_path) = self.paths(key);

        let meta = match Self::read_meta(&meta_path).await {
            Ok(Some(meta)) => meta,
            Ok(None) => return self.miss().await,
            Err(CacheError::SerializationError(msg)) => {
                tracing::warn!(key = %key, error = %msg, "Discarding corrupt cache metadata");
                Self::remove_pair(&data_path, &meta_path).await?;
                return self.miss().await;
            }
            Err(e) => return Err(e),
        };

        if meta.is_expired() {
            Self::remove_pair(&data_path, &meta_path).await?;
            self.stats.increment_evictions();
            return self.miss().await;
        }

        let body = match tokio::fs::read(&data_path).await {
            Ok(body) => Bytes::from(body),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                remove_if_exists(&meta_path).await?;
                return self.miss().await;
            }
            Err(e) => return Err(e.into()),
        };

        if body.len() != meta.content_length {
            tracing::warn!(
                key = %key,
                expected = meta.content_length,
                actual = body.len(),
                "Discarding truncated cache entry"
            );
            Self::remove_pair(&data_path, &meta_path).await?;
            return self.miss().await;
        }

        self.stats.increment_hits();
        Ok(Some(CacheEntry::from_parts(meta, body)))
    }

    async fn set(&self, key: String, entry: CacheEntry) -> Result<(), CacheError> {
        let (data_path, meta_path) = self.paths(&key);
        let (meta, body) = entry.into_parts();
        let meta_json = serde_json::to_vec(&meta)?;

        write_file_atomic(&data_path, &body).await?;
        write_file_atomic(&meta_path, &meta_json).await?;
        Ok(())
    }

    async fn stats(&self) -> Result<CacheStats, CacheError> {
        let mut size = 0u64;
        let mut count = 0u64;

        let mut dir = tokio::fs::read_dir(&self.entries_dir).await?;
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            match path.extension().and_then(|e| e.to_str()) {
                Some("data") => size += entry.metadata().await?.len(),
                Some("meta") => count += 1,
                _ => {}
            }
        }

        Ok(self.stats.snapshot(size, count, 0))
    }
}

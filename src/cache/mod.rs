// Cache module - response storage behind the caching transport
//
// Two backends share the `Cache` trait: an in-process moka cache bounded by
// total size and a directory of files that survives restarts.

pub mod config;
pub mod control;
pub mod disk;
pub mod entry;
pub mod error;
pub mod memory;
pub mod stats;
pub mod traits;

pub use config::{CacheConfig, CacheMode};
pub use control::CacheControl;
pub use disk::DiskCache;
pub use entry::{CacheEntry, CacheMeta};
pub use error::CacheError;
pub use memory::MemoryCache;
pub use stats::CacheStats;
pub use traits::Cache;

use std::sync::Arc;

/// Build the configured cache backend; `None` when caching is disabled
pub async fn build_cache(config: &CacheConfig) -> Result<Option<Arc<dyn Cache>>, CacheError> {
    match config.mode {
        CacheMode::None => Ok(None),
        CacheMode::Memory => Ok(Some(Arc::new(MemoryCache::new(config.max_size_bytes())))),
        CacheMode::Disk => {
            let dir = config.dir.as_ref().ok_or_else(|| {
                CacheError::ConfigurationError("cache.dir is required for disk mode".to_string())
            })?;
            Ok(Some(Arc::new(DiskCache::new(dir).await?)))
        }
    }
}

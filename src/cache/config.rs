//! Cache configuration types

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::constants::{DEFAULT_MAX_CACHE_SIZE_MB, DEFAULT_TTL_SECONDS};

/// Where fetched responses are kept between requests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheMode {
    /// No caching layer at all
    #[default]
    None,
    Memory,
    Disk,
}

/// `cache:` section of the configuration file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub mode: CacheMode,
    /// Required in disk mode
    #[serde(default)]
    pub dir: Option<PathBuf>,
    #[serde(default = "default_max_size_mb")]
    pub max_size_mb: u64,
    #[serde(default = "default_ttl_seconds")]
    pub default_ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            mode: CacheMode::None,
            dir: None,
            max_size_mb: default_max_size_mb(),
            default_ttl_seconds: default_ttl_seconds(),
        }
    }
}

fn default_max_size_mb() -> u64 {
    DEFAULT_MAX_CACHE_SIZE_MB
}

fn default_ttl_seconds() -> u64 {
    DEFAULT_TTL_SECONDS
}

impl CacheConfig {
    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_mb * 1024 * 1024
    }

    pub fn default_ttl(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.default_ttl_seconds)
    }

    pub fn validate(&self) -> Result<(), String> {
        match self.mode {
            CacheMode::None => Ok(()),
            CacheMode::Memory => {
                if self.max_size_mb == 0 {
                    return Err("cache.max_size_mb must be greater than 0".to_string());
                }
                Ok(())
            }
            CacheMode::Disk => match &self.dir {
                Some(dir) if !dir.as_os_str().is_empty() => Ok(()),
                _ => Err("cache.dir is required when cache.mode is disk".to_string()),
            },
        }
    }
}

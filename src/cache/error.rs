//! Cache error types
//!
//! Cache failures are never fatal to a request: the caching transport logs
//! them and carries on as if the cache were empty.

/// Cache error types
#[derive(Debug)]
pub enum CacheError {
    /// Entry is larger than the cache may hold
    StorageFull,
    /// I/O error (disk cache)
    IoError(std::io::Error),
    /// Configuration error
    ConfigurationError(String),
    /// Serialization/deserialization error of entry metadata
    SerializationError(String),
}

impl std::fmt::Display for CacheError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheError::StorageFull => write!(f, "Cache storage is full"),
            CacheError::IoError(err) => write!(f, "I/O error: {}", err),
            CacheError::ConfigurationError(msg) => write!(f, "Configuration error: {}", msg),
            CacheError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl std::error::Error for CacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CacheError::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        CacheError::IoError(err)
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::SerializationError(err.to_string())
    }
}

//! Utility functions for disk cache

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// SHA-256 of the cache key, used as the file stem
pub fn key_to_hash(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Data and metadata paths for an entry
pub fn generate_paths(entries_dir: &Path, hash: &str) -> (PathBuf, PathBuf) {
    let data_path = entries_dir.join(format!("{}.data", hash));
    let meta_path = entries_dir.join(format!("{}.meta", hash));
    (data_path, meta_path)
}

/// Write through a uniquely named temp file and rename into place
pub async fn write_file_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let temp_path = path.with_extension(format!("{}.tmp", uuid::Uuid::new_v4().simple()));
    if let Err(e) = tokio::fs::write(&temp_path, data).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(e);
    }
    tokio::fs::rename(&temp_path, path).await
}

/// Remove a file, treating "not found" as success
pub async fn remove_if_exists(path: &Path) -> std::io::Result<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

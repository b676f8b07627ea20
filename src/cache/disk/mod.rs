//! Disk-based cache implementation
//!
//! Each entry is two files under `{dir}/entries/`, named by the SHA-256 of the
//! cache key: `{hash}.data` holds the body and `{hash}.meta` the JSON
//! metadata. Both are written through a temp file and renamed into place, and
//! the metadata is written last so a reader never sees metadata without data.

pub use self::disk_cache::DiskCache;

mod disk_cache;
pub mod utils;

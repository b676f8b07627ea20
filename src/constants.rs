// Constants module - centralized default values for configuration
//
// Defaults used across config parsing, the fetch layer and the caches live
// here instead of being scattered as magic numbers.

// =============================================================================
// Server defaults
// =============================================================================

/// Default listen address
pub const DEFAULT_ADDRESS: &str = "127.0.0.1";

/// Default listen port
pub const DEFAULT_PORT: u16 = 8080;

/// Default outbound fetch timeout in seconds
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

/// Default cap on a fetched response body in megabytes (0 = unbounded)
pub const DEFAULT_MAX_BODY_SIZE_MB: u64 = 50;

// =============================================================================
// Transform limits
// =============================================================================

/// Default maximum output width in pixels (0 = unbounded)
pub const DEFAULT_MAX_WIDTH: u32 = 2000;

/// Default maximum output height in pixels (0 = unbounded)
pub const DEFAULT_MAX_HEIGHT: u32 = 2000;

/// JPEG re-encode quality
pub const JPEG_QUALITY: u8 = 95;

// =============================================================================
// Object storage defaults
// =============================================================================

/// Region used when none is configured
pub const DEFAULT_S3_REGION: &str = "us-east-1";

/// Host used for bucket-subdomain addressing in the default region
pub const DEFAULT_S3_HOST: &str = "s3.amazonaws.com";

/// Object-storage responses are treated as immutable per path:
/// `Cache-Control: public, max-age=315576000`
pub const BACKEND_CACHE_CONTROL: &str = "public, max-age=315576000";

/// Expires offset for object-storage responses (10 years)
pub const BACKEND_EXPIRES_DAYS: i64 = 365 * 10;

// =============================================================================
// Cache defaults
// =============================================================================

/// Default memory cache capacity in megabytes
pub const DEFAULT_MAX_CACHE_SIZE_MB: u64 = 256;

/// Default lifetime of a cached response without max-age, in seconds
pub const DEFAULT_TTL_SECONDS: u64 = 3600;

/// Header added to responses served from the cache
pub const FROM_CACHE_HEADER: &str = "x-from-cache";

/// Cache statistics are logged once every this many chain requests
pub const CACHE_STATS_LOG_INTERVAL: u64 = 1000;

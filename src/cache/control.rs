//! Cache-Control header parsing
//!
//! Decides whether a fetched response may be stored by this (shared) cache
//! and for how long:
//! - `no-store`, `no-cache` and `private` forbid storage; nothing here can
//!   revalidate, so `no-cache` is treated like `no-store`
//! - `s-maxage` takes precedence over `max-age`
//! - a zero lifetime means the response is stale on arrival and not stored
//! - delta-seconds above 2^31 are capped at 2^31
//!
//! `Expires` is deliberately not consulted.
//!
//! # Example
//!
//! ```rust
//! use kagami::cache::CacheControl;
//!
//! let cc = CacheControl::parse("public, max-age=3600");
//! assert_eq!(cc.max_age, Some(std::time::Duration::from_secs(3600)));
//! assert!(cc.should_store());
//! ```

use std::time::Duration;

/// Largest delta-seconds value honoured; bigger values are treated as this
const MAX_DELTA_SECONDS: u64 = 1 << 31;

/// Parsed Cache-Control header directives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheControl {
    /// max-age directive
    pub max_age: Option<Duration>,
    /// s-maxage directive, overrides max-age for shared caches
    pub s_maxage: Option<Duration>,
    pub no_store: bool,
    pub no_cache: bool,
    pub private: bool,
}

impl CacheControl {
    /// Parse a Cache-Control header value. Unknown directives are ignored.
    pub fn parse(header_value: &str) -> Self {
        let mut result = Self::default();

        for directive in header_value.split(',') {
            let directive = directive.trim().to_lowercase();
            if directive.is_empty() {
                continue;
            }

            if let Some((name, value)) = directive.split_once('=') {
                let seconds = value
                    .trim()
                    .trim_matches('"')
                    .parse::<u64>()
                    .ok()
                    .map(|s| s.min(MAX_DELTA_SECONDS));
                match name.trim() {
                    "max-age" => result.max_age = seconds.map(Duration::from_secs),
                    "s-maxage" => result.s_maxage = seconds.map(Duration::from_secs),
                    _ => {}
                }
            } else {
                match directive.as_str() {
                    "no-store" => result.no_store = true,
                    "no-cache" => result.no_cache = true,
                    "private" => result.private = true,
                    _ => {}
                }
            }
        }

        result
    }

    pub fn is_cacheable_by_shared_cache(&self) -> bool {
        !self.no_store && !self.no_cache && !self.private
    }

    /// Stricter than [`is_cacheable_by_shared_cache`](Self::is_cacheable_by_shared_cache):
    /// an explicit zero lifetime is not worth storing either.
    pub fn should_store(&self) -> bool {
        if !self.is_cacheable_by_shared_cache() {
            return false;
        }
        !matches!(self.effective_max_age(), Some(age) if age.is_zero())
    }

    /// Lifetime for a stored response; `default_ttl` when no max-age is given
    pub fn effective_ttl(&self, default_ttl: Duration) -> Duration {
        self.effective_max_age().unwrap_or(default_ttl)
    }

    fn effective_max_age(&self) -> Option<Duration> {
        self.s_maxage.or(self.max_age)
    }
}

// Request pipeline module - per-request context carried through the Pingora hooks

use std::time::{Duration, Instant};
use uuid::Uuid;

/// Request context that holds all information about an HTTP request
/// as it flows through the proxy hooks
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: String,
    method: String,
    path: String,
    started_at: Instant,
    /// Target URL once the request has been parsed
    target_url: Option<String>,
    /// Canonical directive string, empty when no transform was requested
    directives: String,
    from_cache: bool,
}

impl RequestContext {
    /// Create a new RequestContext
    /// Automatically generates a unique request ID (UUID v4) and starts the clock
    pub fn new(method: String, path: String) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            method,
            path,
            started_at: Instant::now(),
            target_url: None,
            directives: String::new(),
            from_cache: false,
        }
    }

    /// Get the unique request ID
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Fill in method and path once the request header is available
    pub fn set_request_line(&mut self, method: &str, path: &str) {
        self.method = method.to_string();
        self.path = path.to_string();
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn target_url(&self) -> Option<&str> {
        self.target_url.as_deref()
    }

    pub fn directives(&self) -> &str {
        &self.directives
    }

    pub fn set_target(&mut self, url: &str, directives: String) {
        self.target_url = Some(url.to_string());
        self.directives = directives;
    }

    pub fn from_cache(&self) -> bool {
        self.from_cache
    }

    pub fn set_from_cache(&mut self, from_cache: bool) {
        self.from_cache = from_cache;
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new("GET".to_string(), "/".to_string())
    }
}

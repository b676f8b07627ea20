// Error types module

use thiserror::Error;

/// Centralized error type for the proxy
///
/// Every failure inside the request chain is surfaced as one of these
/// variants. The dispatcher is the only place that turns them into HTTP
/// status codes (see [`ProxyError::to_http_status`]).
#[derive(Debug, Clone, Error)]
pub enum ProxyError {
    /// Malformed request URL or directive string
    #[error("{0}")]
    BadRequest(String),

    /// Remote host is not on the allow-list
    #[error("remote URL is not for an allowed host: {0}")]
    Forbidden(String),

    /// Fetch failed at the transport level, or the origin answered with a
    /// non-success status
    #[error("{message}")]
    Upstream {
        status: Option<u16>,
        message: String,
    },

    /// Building the signed object-storage request failed
    #[error("Signing error: {0}")]
    Signing(String),

    /// Configuration errors (invalid YAML, missing env vars, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal proxy errors (task panics, unexpected errors)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ProxyError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ProxyError::BadRequest(message.into())
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        ProxyError::Upstream {
            status: None,
            message: message.into(),
        }
    }

    pub fn upstream_status(status: u16, message: impl Into<String>) -> Self {
        ProxyError::Upstream {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Maps proxy errors to HTTP status codes
    ///
    /// Disallowed hosts are reported as 400, not 403.
    pub fn to_http_status(&self) -> u16 {
        match self {
            ProxyError::BadRequest(_) | ProxyError::Forbidden(_) => 400,
            ProxyError::Upstream { .. }
            | ProxyError::Signing(_)
            | ProxyError::Config(_)
            | ProxyError::Internal(_) => 500,
        }
    }

    /// Short reason phrase used as the `error` field of JSON error bodies
    pub fn reason(&self) -> &'static str {
        match self.to_http_status() {
            400 => "Bad Request",
            _ => "Internal Server Error",
        }
    }
}

impl From<reqwest::Error> for ProxyError {
    fn from(err: reqwest::Error) -> Self {
        ProxyError::Upstream {
            status: err.status().map(|s| s.as_u16()),
            message: format!("error fetching remote image: {}", err),
        }
    }
}

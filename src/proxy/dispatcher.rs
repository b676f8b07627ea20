//! Request dispatcher
//!
//! Turns an inbound request head into a finished [`ImageResponse`] without
//! touching the Pingora session, so the whole flow can be driven from tests:
//!
//! ```text
//! parse -> clamp -> allow-list -> chain -> status check -> revalidate -> serve
//! ```
//!
//! Any failure short-circuits into a JSON error response.

use bytes::Bytes;
use chrono::DateTime;
use http::header::{
    CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE, ETAG, EXPIRES, IF_MODIFIED_SINCE, IF_NONE_MATCH,
    LAST_MODIFIED,
};
use http::request::Parts;
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use std::sync::Arc;

use crate::config::ProxyConfig;
use crate::constants::FROM_CACHE_HEADER;
use crate::error::ProxyError;
use crate::request::ImageRequest;
use crate::transport::{ImageResponse, Transport};

/// Headers copied from the fetched response onto the client response
const FORWARDED_HEADERS: [HeaderName; 5] =
    [LAST_MODIFIED, EXPIRES, ETAG, CONTENT_TYPE, CACHE_CONTROL];

/// What the dispatcher decided for one request
#[derive(Debug)]
pub struct Dispatch {
    pub response: ImageResponse,
    /// The parsed request, when parsing got that far
    pub request: Option<ImageRequest>,
}

impl Dispatch {
    fn failed(request: Option<ImageRequest>, err: &ProxyError) -> Self {
        Self {
            response: error_response(err),
            request,
        }
    }

    pub fn from_cache(&self) -> bool {
        self.response.header(FROM_CACHE_HEADER).is_some()
    }
}

pub struct Dispatcher {
    config: Arc<ProxyConfig>,
    chain: Arc<dyn Transport>,
}

impl Dispatcher {
    pub fn new(config: Arc<ProxyConfig>, chain: Arc<dyn Transport>) -> Self {
        Self { config, chain }
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Serve one request
    pub async fn handle(&self, head: &Parts) -> Dispatch {
        let is_head = head.method == Method::HEAD;
        if head.method != Method::GET && !is_head {
            return Dispatch {
                response: method_not_allowed(&head.method),
                request: None,
            };
        }

        let mut request = match ImageRequest::parse(
            head.uri.path(),
            head.uri.query(),
            self.config.backend_endpoint(),
        ) {
            Ok(request) => request,
            Err(e) => {
                tracing::debug!(path = %head.uri.path(), error = %e, "Rejected malformed request");
                return Dispatch::failed(None, &e);
            }
        };

        request.clamp(self.config.max_width, self.config.max_height);

        if !self.config.allow_list.allows(&request.url) {
            tracing::warn!(url = %request.url, "Remote host not on allow-list");
            let err = ProxyError::Forbidden(request.url.to_string());
            return Dispatch::failed(Some(request), &err);
        }

        let fetched = match self.chain.round_trip(&request).await {
            Ok(fetched) => fetched,
            Err(e) => {
                tracing::warn!(url = %request.url, error = %e, "Fetch failed");
                return Dispatch::failed(Some(request), &e);
            }
        };

        if fetched.status != StatusCode::OK {
            let err = ProxyError::upstream_status(
                fetched.status.as_u16(),
                format!(
                    "Remote URL {:?} returned status: {}",
                    request.url.as_str(),
                    fetched.status_line()
                ),
            );
            tracing::warn!(
                url = %request.url,
                status_code = fetched.status.as_u16(),
                "Remote returned non-200 status"
            );
            return Dispatch::failed(Some(request), &err);
        }

        let response = serve(&fetched, &head.headers, is_head);
        Dispatch {
            response,
            request: Some(request),
        }
    }
}

/// Build the client response for a successful fetch
fn serve(fetched: &ImageResponse, request_headers: &HeaderMap, is_head: bool) -> ImageResponse {
    let from_cache = HeaderName::from_static(FROM_CACHE_HEADER);
    let mut headers = HeaderMap::new();
    for name in FORWARDED_HEADERS.iter().chain([&from_cache]) {
        if let Some(value) = fetched.headers.get(name) {
            headers.insert(name.clone(), value.clone());
        }
    }

    if check_not_modified(fetched, request_headers) {
        return ImageResponse::new(StatusCode::NOT_MODIFIED, headers, Bytes::new());
    }

    headers.insert(CONTENT_LENGTH, HeaderValue::from(fetched.body.len()));
    let body = if is_head {
        Bytes::new()
    } else {
        fetched.body.clone()
    };
    ImageResponse::new(StatusCode::OK, headers, body)
}

/// Whether the caller's validators match the fetched response
///
/// An equal non-empty ETag wins. Otherwise both Last-Modified and
/// If-Modified-Since must parse as HTTP dates and the resource must be
/// strictly older than the caller's copy. Anything unparseable means a full
/// response.
pub fn check_not_modified(fetched: &ImageResponse, request_headers: &HeaderMap) -> bool {
    if let (Some(etag), Some(if_none_match)) = (
        header(&fetched.headers, ETAG),
        header(request_headers, IF_NONE_MATCH),
    ) {
        if etag == if_none_match {
            return true;
        }
    }

    let (Some(last_modified), Some(if_modified_since)) = (
        header(&fetched.headers, LAST_MODIFIED),
        header(request_headers, IF_MODIFIED_SINCE),
    ) else {
        return false;
    };

    match (
        DateTime::parse_from_rfc2822(last_modified),
        DateTime::parse_from_rfc2822(if_modified_since),
    ) {
        (Ok(modified), Ok(since)) => modified < since,
        _ => false,
    }
}

fn header(headers: &HeaderMap, name: HeaderName) -> Option<&str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// JSON error body: `{"error", "message", "status"}`
pub fn error_response(err: &ProxyError) -> ImageResponse {
    let status = err.to_http_status();
    json_response(status, err.reason(), &err.to_string())
}

fn method_not_allowed(method: &Method) -> ImageResponse {
    let mut response = json_response(
        405,
        "Method Not Allowed",
        &format!("method {} is not supported", method),
    );
    response
        .headers
        .insert(http::header::ALLOW, HeaderValue::from_static("GET, HEAD"));
    response
}

fn json_response(status: u16, error: &str, message: &str) -> ImageResponse {
    let body = serde_json::json!({
        "error": error,
        "message": message,
        "status": status,
    })
    .to_string();

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    ImageResponse::new(status, headers, Bytes::new()).with_body(Bytes::from(body))
}

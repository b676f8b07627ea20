//! Inbound request parsing
//!
//! Turns the request target into an [`ImageRequest`]: the remote resource URL
//! plus the parsed transform directives.
//!
//! Direct mode: `/{directives}/{absolute-url}` or `/{absolute-url}`.
//! Backend mode: `/{object/path}?{directives}`.

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::ProxyError;
use crate::options::TransformOptions;
use crate::s3::BackendEndpoint;

/// A single inbound image request
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRequest {
    /// Remote resource, without any directive fragment
    pub url: Url,
    pub options: TransformOptions,
}

impl ImageRequest {
    pub fn new(url: Url, options: TransformOptions) -> Self {
        Self { url, options }
    }

    /// Parse a request target
    ///
    /// When `backend` is set the path is a bucket-relative object key and the
    /// query string carries the directives. Otherwise the first path segment
    /// holds the directives unless it already starts the remote URL.
    pub fn parse(
        path: &str,
        query: Option<&str>,
        backend: Option<&BackendEndpoint>,
    ) -> Result<Self, ProxyError> {
        match backend {
            Some(endpoint) => Self::parse_object_request(path, query, endpoint),
            None => Self::parse_remote_request(path, query),
        }
    }

    fn parse_remote_request(path: &str, query: Option<&str>) -> Result<Self, ProxyError> {
        let path = path.trim_start_matches('/');
        if path.is_empty() {
            return Err(ProxyError::bad_request("missing remote URL"));
        }

        let (directives, remote) = if looks_like_url(path) {
            ("", path)
        } else {
            path.split_once('/')
                .ok_or_else(|| ProxyError::bad_request("missing remote URL"))?
        };

        let options = TransformOptions::decode(directives)?;

        let mut remote = repair_scheme_slashes(remote);
        if let Some(q) = query.filter(|q| !q.is_empty()) {
            remote.push('?');
            remote.push_str(q);
        }

        let url = Url::parse(&remote)
            .map_err(|e| ProxyError::bad_request(format!("invalid remote URL {:?}: {}", remote, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ProxyError::bad_request(format!(
                "remote URL must be http or https: {}",
                url
            )));
        }
        if url.host_str().map_or(true, str::is_empty) {
            return Err(ProxyError::bad_request(format!(
                "remote URL has no host: {}",
                url
            )));
        }

        Ok(Self::new(url, options))
    }

    fn parse_object_request(
        path: &str,
        query: Option<&str>,
        endpoint: &BackendEndpoint,
    ) -> Result<Self, ProxyError> {
        let key = path.trim_start_matches('/');
        if key.is_empty() {
            return Err(ProxyError::bad_request("missing object path"));
        }
        validate_object_key(key)?;

        let directives = match query {
            Some(q) => urlencoding::decode(q)
                .map_err(|e| ProxyError::bad_request(format!("invalid directive string: {}", e)))?
                .into_owned(),
            None => String::new(),
        };
        let options = TransformOptions::decode(&directives)?;
        let url = endpoint.object_url(key)?;

        Ok(Self::new(url, options))
    }

    /// Clamp absolute target dimensions to the configured maxima (0 = unbounded)
    ///
    /// Fractional values are left alone, as are values already within bounds.
    pub fn clamp(&mut self, max_width: u32, max_height: u32) {
        self.options.width = clamp_dimension(self.options.width, max_width);
        self.options.height = clamp_dimension(self.options.height, max_height);
    }

    /// Key used by the chain: `URL#directives`, or the bare URL when empty
    pub fn cache_key(&self) -> String {
        if self.options.is_empty() {
            self.url.to_string()
        } else {
            format!("{}#{}", self.url, self.options.encode())
        }
    }
}

/// Every segment must name something: no empty, `.` or `..` segments, raw
/// or percent-encoded
fn validate_object_key(key: &str) -> Result<(), ProxyError> {
    for segment in key.split('/') {
        let decoded = urlencoding::decode(segment)
            .map_err(|e| ProxyError::bad_request(format!("invalid object path: {}", e)))?;
        if decoded.is_empty() || decoded == "." || decoded == ".." {
            return Err(ProxyError::bad_request(format!(
                "invalid object path {:?}",
                key
            )));
        }
    }
    Ok(())
}

fn clamp_dimension(value: f64, max: u32) -> f64 {
    if max > 0 && value >= 1.0 && value > f64::from(max) {
        f64::from(max)
    } else {
        value
    }
}

fn looks_like_url(path: &str) -> bool {
    path.starts_with("http:") || path.starts_with("https:")
}

/// Path normalisers collapse `http://host` into `http:/host`
fn repair_scheme_slashes(remote: &str) -> String {
    for scheme in ["https:", "http:"] {
        if let Some(rest) = remote.strip_prefix(scheme) {
            if !rest.starts_with("//") {
                return format!("{}//{}", scheme, rest.trim_start_matches('/'));
            }
        }
    }
    remote.to_string()
}

/// Hosts that images may be proxied from
///
/// Entries are exact hosts or `*.suffix` wildcards. An empty list allows
/// every host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "AllowListSource", into = "Vec<String>")]
pub struct AllowList {
    patterns: Vec<String>,
}

/// YAML accepts either a list or a comma separated string
#[derive(Deserialize)]
#[serde(untagged)]
enum AllowListSource {
    List(Vec<String>),
    Joined(String),
}

impl From<AllowListSource> for AllowList {
    fn from(source: AllowListSource) -> Self {
        match source {
            AllowListSource::List(list) => AllowList::new(list),
            AllowListSource::Joined(joined) => AllowList::parse(&joined),
        }
    }
}

impl From<AllowList> for Vec<String> {
    fn from(list: AllowList) -> Self {
        list.patterns
    }
}

impl AllowList {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| p.as_ref().trim().to_ascii_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        Self { patterns }
    }

    /// Parse a comma separated list such as `"*.example.com,cdn.example.org"`
    pub fn parse(list: &str) -> Self {
        Self::new(list.split(','))
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn allows(&self, url: &Url) -> bool {
        match url.host_str() {
            Some(host) => match url.port() {
                Some(port) => self.allows_host(&format!("{}:{}", host, port)),
                None => self.allows_host(host),
            },
            None => self.is_empty(),
        }
    }

    /// `*.example.com` matches `img.example.com` but neither `example.com`
    /// nor `badexample.com`.
    pub fn allows_host(&self, host: &str) -> bool {
        if self.patterns.is_empty() {
            return true;
        }

        let host = host.to_ascii_lowercase();
        self.patterns.iter().any(|pattern| {
            if *pattern == host {
                return true;
            }
            match pattern.strip_prefix('*') {
                Some(suffix) if suffix.starts_with('.') => host.ends_with(suffix),
                _ => false,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Rotation;

    fn parse(path: &str, query: Option<&str>) -> Result<ImageRequest, ProxyError> {
        ImageRequest::parse(path, query, None)
    }

    #[test]
    fn test_parse_url_without_directives() {
        let req = parse("/https://img.example.com/a/b.png", None).unwrap();
        assert_eq!(req.url.as_str(), "https://img.example.com/a/b.png");
        assert!(req.options.is_empty());
    }

    #[test]
    fn test_parse_url_with_directives() {
        let req = parse("/100x50,fit,r90/http://example.com/cat.jpg", None).unwrap();
        assert_eq!(req.url.as_str(), "http://example.com/cat.jpg");
        assert_eq!(req.options.width, 100.0);
        assert_eq!(req.options.height, 50.0);
        assert!(req.options.fit);
        assert_eq!(req.options.rotate, Rotation::Cw90);
    }

    #[test]
    fn test_parse_empty_directive_segment() {
        let req = parse("//http://example.com/cat.jpg", None).unwrap();
        assert!(req.options.is_empty());
        assert_eq!(req.url.host_str(), Some("example.com"));
    }

    #[test]
    fn test_parse_repairs_collapsed_scheme() {
        let req = parse("/200/https:/example.com/cat.jpg", None).unwrap();
        assert_eq!(req.url.as_str(), "https://example.com/cat.jpg");
    }

    #[test]
    fn test_parse_keeps_remote_query() {
        let req = parse("/x100/http://example.com/img", Some("id=7&s=2")).unwrap();
        assert_eq!(req.url.as_str(), "http://example.com/img?id=7&s=2");
    }

    #[test]
    fn test_parse_rejects_bad_directive() {
        let err = parse("/blur/http://example.com/cat.jpg", None).unwrap_err();
        assert!(matches!(err, ProxyError::BadRequest(_)));
    }

    #[test]
    fn test_parse_rejects_missing_or_relative_url() {
        assert!(parse("/", None).is_err());
        assert!(parse("/100x100", None).is_err());
        assert!(parse("/100x100/not-a-url", None).is_err());
        assert!(parse("/100/ftp://example.com/a.png", None).is_err());
    }

    #[test]
    fn test_parse_object_request_rejects_dot_and_empty_segments() {
        let endpoint =
            BackendEndpoint::new("media", "us-east-1", Some("http://localhost:9000")).unwrap();
        for path in [
            "/../secret/x.png",
            "/%2e%2e/secret/x.png",
            "/pics/%2E%2E/x.png",
            "/./a.png",
            "/pics//a.png",
            "/pics/",
        ] {
            let err = ImageRequest::parse(path, None, Some(&endpoint)).unwrap_err();
            assert!(matches!(err, ProxyError::BadRequest(_)), "{}", path);
        }

        let ok = ImageRequest::parse("/pics/a.png", Some("10x10"), Some(&endpoint)).unwrap();
        assert_eq!(ok.url.as_str(), "http://localhost:9000/media/pics/a.png");
        assert_eq!(ok.options.width, 10.0);
    }

    #[test]
    fn test_cache_key_omits_fragment_for_empty_options() {
        let req = parse("/http://example.com/a.png", None).unwrap();
        assert_eq!(req.cache_key(), "http://example.com/a.png");

        let req = parse("/fit,100x100/http://example.com/a.png", None).unwrap();
        assert_eq!(req.cache_key(), "http://example.com/a.png#100x100,fit");
    }

    #[test]
    fn test_clamp_limits_absolute_dimensions() {
        let mut req = parse("/5000x100/http://example.com/a.png", None).unwrap();
        req.clamp(2000, 2000);
        assert_eq!(req.options.width, 2000.0);
        assert_eq!(req.options.height, 100.0);
    }

    #[test]
    fn test_clamp_ignores_fractions_and_unbounded() {
        let mut req = parse("/0.5x9000/http://example.com/a.png", None).unwrap();
        req.clamp(2000, 0);
        assert_eq!(req.options.width, 0.5);
        assert_eq!(req.options.height, 9000.0);
    }

    #[test]
    fn test_allow_list_wildcard() {
        let list = AllowList::parse("*.example.com");
        assert!(list.allows_host("img.example.com"));
        assert!(list.allows_host("a.b.example.com"));
        assert!(!list.allows_host("example.com"));
        assert!(!list.allows_host("badexample.com"));
    }

    #[test]
    fn test_allow_list_exact_and_case() {
        let list = AllowList::parse(" cdn.example.org , Other.test ");
        assert_eq!(list.patterns(), &["cdn.example.org", "other.test"]);
        assert!(list.allows_host("CDN.example.org"));
        assert!(list.allows_host("other.test"));
        assert!(!list.allows_host("www.other.test"));
    }

    #[test]
    fn test_empty_allow_list_allows_everything() {
        let list = AllowList::parse("");
        assert!(list.is_empty());
        assert!(list.allows(&Url::parse("http://anything.invalid/x").unwrap()));
    }

    #[test]
    fn test_allow_list_includes_explicit_port() {
        let list = AllowList::parse("localhost:9000");
        assert!(list.allows(&Url::parse("http://localhost:9000/a.png").unwrap()));
        assert!(!list.allows(&Url::parse("http://localhost:9001/a.png").unwrap()));
    }

    #[test]
    fn test_allow_list_deserializes_from_string_or_list() {
        let from_string: AllowList = serde_yaml::from_str("\"a.test,*.b.test\"").unwrap();
        let from_list: AllowList = serde_yaml::from_str("- a.test\n- \"*.b.test\"\n").unwrap();
        assert_eq!(from_string, from_list);
    }
}

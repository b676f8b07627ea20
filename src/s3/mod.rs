// S3 module - signed object-storage requests
//
// Requests against the backend bucket are authenticated with AWS Signature
// Version 4. A SignedRequest is built fresh for every fetch: the timestamp is
// part of the signature and we do not track what the backend made of any
// earlier attempt.

mod fetcher;

pub use fetcher::{far_future_response, ObjectStoreFetcher};

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::Url;
use sha2::{Digest, Sha256};

use crate::constants::{DEFAULT_S3_HOST, DEFAULT_S3_REGION};
use crate::error::ProxyError;

type HmacSha256 = Hmac<Sha256>;

/// Format of the `Date` header (RFC 1123, always GMT)
pub const RFC1123_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Access key pair for the backend
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key: String,
    pub secret_key: String,
}

impl Credentials {
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
        }
    }

    pub fn validate(&self) -> Result<(), ProxyError> {
        if self.access_key.is_empty() {
            return Err(ProxyError::Signing(
                "S3 access key cannot be empty".to_string(),
            ));
        }
        if self.secret_key.is_empty() {
            return Err(ProxyError::Signing(
                "S3 secret key cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

// Keep the secret out of logs
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// Where and how the backend bucket is addressed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendEndpoint {
    bucket: String,
    region: String,
    base_url: Url,
    path_style: bool,
}

impl BackendEndpoint {
    /// Bucket-subdomain addressing against AWS unless `endpoint` overrides it,
    /// in which case path-style addressing (`{endpoint}/{bucket}/{key}`) is used.
    pub fn new(bucket: &str, region: &str, endpoint: Option<&str>) -> Result<Self, ProxyError> {
        validate_bucket_name(bucket)?;
        let region = if region.is_empty() {
            DEFAULT_S3_REGION
        } else {
            region
        };

        let (base, path_style) = match endpoint {
            Some(endpoint) => (endpoint.trim_end_matches('/').to_string(), true),
            None if region == DEFAULT_S3_REGION => {
                (format!("https://{}.{}", bucket, DEFAULT_S3_HOST), false)
            }
            None => (
                format!("https://{}.s3.{}.amazonaws.com", bucket, region),
                false,
            ),
        };

        let base_url = Url::parse(&base)
            .map_err(|e| ProxyError::Signing(format!("bad S3 endpoint URL {:?}: {}", base, e)))?;
        if base_url.host_str().is_none() {
            return Err(ProxyError::Signing(format!(
                "bad S3 endpoint URL {:?}: missing host",
                base
            )));
        }

        Ok(Self {
            bucket: bucket.to_string(),
            region: region.to_string(),
            base_url,
            path_style,
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn is_path_style(&self) -> bool {
        self.path_style
    }

    /// Value of the `Host` header (includes a non-default port)
    pub fn host(&self) -> String {
        let host = self.base_url.host_str().unwrap_or_default();
        match self.base_url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        }
    }

    /// `/` + bucket + object path, the path-style form of the resource
    pub fn sign_path(&self, key: &str) -> String {
        format!("/{}/{}", self.bucket, encode_key(key))
    }

    /// Path sent on the wire for `key`
    pub fn request_path(&self, key: &str) -> String {
        if self.path_style {
            self.sign_path(key)
        } else {
            format!("/{}", encode_key(key))
        }
    }

    /// Absolute URL of the object at `key`
    ///
    /// Fails if the URL parser would resolve any part of the path away, so a
    /// key can never address anything outside the bucket.
    pub fn object_url(&self, key: &str) -> Result<Url, ProxyError> {
        let path = self.request_path(key);
        let mut url = self.base_url.clone();
        url.set_path(&path);
        if url.path() != path {
            return Err(ProxyError::bad_request(format!(
                "object path {:?} leaves bucket {}",
                key, self.bucket
            )));
        }
        Ok(url)
    }
}

fn validate_bucket_name(bucket: &str) -> Result<(), ProxyError> {
    if bucket.is_empty() {
        return Err(ProxyError::Signing(
            "S3 bucket name cannot be empty".to_string(),
        ));
    }
    // Prevent injection into the host or path
    if bucket.contains(['/', ':', '@']) {
        return Err(ProxyError::Signing(format!("bad S3 bucket: {:?}", bucket)));
    }
    Ok(())
}

/// URI-encode every path segment, leaving the separators alone
///
/// Segments are decoded first so keys that arrive percent-encoded are not
/// encoded twice.
pub fn encode_key(key: &str) -> String {
    key.trim_start_matches('/')
        .split('/')
        .map(|segment| {
            let decoded = urlencoding::decode(segment)
                .map(|s| s.into_owned())
                .unwrap_or_else(|_| segment.to_string());
            urlencoding::encode(&decoded).into_owned()
        })
        .collect::<Vec<_>>()
        .join("/")
}

// AWS Signature v4 implementation
fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    // HMAC accepts keys of any length, new_from_slice cannot fail here
    let mut mac = match HmacSha256::new_from_slice(key) {
        Ok(mac) => mac,
        Err(_) => unreachable!("HMAC can take key of any size"),
    };
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

pub struct SigningParams<'a> {
    pub method: &'a str,
    pub uri: &'a str,
    pub query_string: &'a str,
    /// Lowercase header names; BTreeMap keeps them sorted for canonicalization
    pub headers: &'a BTreeMap<String, String>,
    pub payload_hash: &'a str,
    pub region: &'a str,
    pub service: &'a str,
    pub date: &'a str,     // Format: YYYYMMDD
    pub datetime: &'a str, // Format: YYYYMMDDTHHMMSSZ
}

pub fn create_canonical_request(params: &SigningParams) -> String {
    let canonical_headers = params
        .headers
        .iter()
        .map(|(k, v)| format!("{}:{}", k, v.trim()))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "{}\n{}\n{}\n{}\n\n{}\n{}",
        params.method,
        params.uri,
        params.query_string,
        canonical_headers,
        signed_headers(params.headers),
        params.payload_hash
    )
}

pub fn create_string_to_sign(params: &SigningParams) -> String {
    let canonical_request = create_canonical_request(params);
    let canonical_request_hash = sha256_hex(canonical_request.as_bytes());

    format!(
        "AWS4-HMAC-SHA256\n{}\n{}\n{}",
        params.datetime,
        credential_scope(params),
        canonical_request_hash
    )
}

pub fn derive_signing_key(secret_key: &str, date: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac_sha256(format!("AWS4{}", secret_key).as_bytes(), date.as_bytes());
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

fn signed_headers(headers: &BTreeMap<String, String>) -> String {
    headers.keys().cloned().collect::<Vec<_>>().join(";")
}

fn credential_scope(params: &SigningParams) -> String {
    format!(
        "{}/{}/{}/aws4_request",
        params.date, params.region, params.service
    )
}

/// Hex signature over the canonical request
pub fn compute_signature(params: &SigningParams, secret_key: &str) -> String {
    let string_to_sign = create_string_to_sign(params);
    let k_signing = derive_signing_key(secret_key, params.date, params.region, params.service);
    hex::encode(hmac_sha256(&k_signing, string_to_sign.as_bytes()))
}

/// A time-stamped, authenticated GET against the backend
#[derive(Debug, Clone)]
pub struct SignedRequest {
    pub method: String,
    pub bucket: String,
    /// Request path as sent on the wire (already URI-encoded)
    pub path: String,
    /// Lowercase header names, `authorization` included
    pub headers: BTreeMap<String, String>,
    pub timestamp: DateTime<Utc>,
    pub signature: String,
}

impl SignedRequest {
    /// Sign a GET for `url` at time `now`
    ///
    /// `extra_headers` are signed and sent along with `host`, `date`,
    /// `x-amz-date` and `x-amz-content-sha256`.
    pub fn get(
        endpoint: &BackendEndpoint,
        url: &Url,
        extra_headers: &[(String, String)],
        credentials: &Credentials,
        now: DateTime<Utc>,
    ) -> Result<Self, ProxyError> {
        credentials.validate()?;

        let datetime = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date = now.format("%Y%m%d").to_string();
        let payload_hash = sha256_hex(b"");

        let mut headers = BTreeMap::new();
        for (name, value) in extra_headers {
            let name = name.trim().to_ascii_lowercase();
            if name.is_empty() || name == "authorization" {
                return Err(ProxyError::Signing(format!(
                    "cannot sign header {:?}",
                    name
                )));
            }
            headers.insert(name, value.clone());
        }
        headers.insert("host".to_string(), endpoint.host());
        headers.insert("date".to_string(), now.format(RFC1123_FORMAT).to_string());
        headers.insert("x-amz-date".to_string(), datetime.clone());
        headers.insert("x-amz-content-sha256".to_string(), payload_hash.clone());

        let method = "GET";
        let params = SigningParams {
            method,
            uri: url.path(),
            query_string: url.query().unwrap_or(""),
            headers: &headers,
            payload_hash: &payload_hash,
            region: endpoint.region(),
            service: "s3",
            date: &date,
            datetime: &datetime,
        };

        let signature = compute_signature(&params, &credentials.secret_key);
        let authorization = format!(
            "AWS4-HMAC-SHA256 Credential={}/{}, SignedHeaders={}, Signature={}",
            credentials.access_key,
            credential_scope(&params),
            signed_headers(&headers),
            signature
        );
        headers.insert("authorization".to_string(), authorization);

        Ok(Self {
            method: method.to_string(),
            bucket: endpoint.bucket().to_string(),
            path: url.path().to_string(),
            headers,
            timestamp: now,
            signature,
        })
    }

    pub fn authorization(&self) -> Option<&str> {
        self.headers.get("authorization").map(String::as_str)
    }
}

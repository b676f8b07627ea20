//! Object-storage backend configuration.

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_S3_REGION;
use crate::s3::{BackendEndpoint, Credentials};

pub const ACCESS_KEY_ENV: &str = "AWS_ACCESS_KEY_ID";
pub const SECRET_KEY_ENV: &str = "AWS_SECRET_ACCESS_KEY";

fn default_region() -> String {
    DEFAULT_S3_REGION.to_string()
}

/// `backend:` section; its presence switches the proxy to bucket mode
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    pub bucket: String,
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom endpoint (MinIO, localstack); selects path-style addressing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<String>,
}

// Custom Debug implementation to redact the secret
impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("access_key", &self.access_key)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl BackendConfig {
    pub fn endpoint(&self) -> Result<BackendEndpoint, String> {
        BackendEndpoint::new(&self.bucket, &self.region, self.endpoint.as_deref())
            .map_err(|e| e.to_string())
    }

    /// Keys from the file, falling back to the standard AWS variables
    pub fn credentials(&self) -> Result<Credentials, String> {
        self.credentials_with(|name| std::env::var(name).ok())
    }

    /// Like [`credentials`](Self::credentials) with an injectable lookup
    pub fn credentials_with<F>(&self, lookup: F) -> Result<Credentials, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let resolve = |configured: &Option<String>, env: &str| {
            configured
                .clone()
                .filter(|v| !v.is_empty())
                .or_else(|| lookup(env).filter(|v| !v.is_empty()))
                .ok_or_else(|| {
                    format!(
                        "backend credentials missing: set backend.{} or {}",
                        if env == ACCESS_KEY_ENV {
                            "access_key"
                        } else {
                            "secret_key"
                        },
                        env
                    )
                })
        };

        let access_key = resolve(&self.access_key, ACCESS_KEY_ENV)?;
        let secret_key = resolve(&self.secret_key, SECRET_KEY_ENV)?;
        Ok(Credentials::new(access_key, secret_key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(yaml: &str) -> BackendConfig {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = backend("bucket: media");
        assert_eq!(config.region, "us-east-1");
        assert_eq!(config.endpoint, None);
        assert_eq!(
            config.endpoint().unwrap().host(),
            "media.s3.amazonaws.com"
        );
    }

    #[test]
    fn test_configured_keys_win_over_env() {
        let config = backend("bucket: media\naccess_key: AK\nsecret_key: SK");
        let creds = config
            .credentials_with(|_| Some("from-env".to_string()))
            .unwrap();
        assert_eq!(creds, Credentials::new("AK", "SK"));
    }

    #[test]
    fn test_env_fallback() {
        let config = backend("bucket: media");
        let creds = config
            .credentials_with(|name| match name {
                ACCESS_KEY_ENV => Some("ENV_AK".to_string()),
                SECRET_KEY_ENV => Some("ENV_SK".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(creds, Credentials::new("ENV_AK", "ENV_SK"));
    }

    #[test]
    fn test_missing_credentials_name_the_variable() {
        let config = backend("bucket: media\naccess_key: AK");
        let err = config.credentials_with(|_| None).unwrap_err();
        assert!(err.contains(SECRET_KEY_ENV), "{}", err);
    }

    #[test]
    fn test_bad_bucket_rejected() {
        let config = backend("bucket: \"evil/../bucket\"");
        assert!(config.endpoint().is_err());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = backend("bucket: media\nsecret_key: hunter2");
        assert!(!format!("{:?}", config).contains("hunter2"));
    }
}

// Configuration module

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

mod backend;
mod server;

pub use backend::{BackendConfig, ACCESS_KEY_ENV, SECRET_KEY_ENV};
pub use server::{LimitsConfig, LogFormat, LoggingConfig, ServerConfig};

use crate::cache::CacheConfig;
use crate::request::AllowList;
use crate::s3::{BackendEndpoint, Credentials};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    /// Comma separated string or list; empty allows every host
    #[serde(default)]
    pub allowed_hosts: AllowList,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<BackendConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    pub fn from_yaml_with_env(yaml: &str) -> Result<Self, String> {
        Self::from_yaml_with_lookup(yaml, |name| std::env::var(name).ok())
    }

    /// Replace every `${VAR_NAME}` through `lookup`, then parse
    ///
    /// A referenced variable that `lookup` cannot resolve is an error.
    pub fn from_yaml_with_lookup<F>(yaml: &str, lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").map_err(|e| e.to_string())?;

        for caps in re.captures_iter(yaml) {
            let var_name = &caps[1];
            if lookup(var_name).is_none() {
                return Err(format!(
                    "Environment variable '{}' is referenced but not set",
                    var_name
                ));
            }
        }

        let substituted = re.replace_all(yaml, |caps: &regex::Captures| {
            lookup(&caps[1]).unwrap_or_default()
        });

        serde_yaml::from_str(&substituted).map_err(|e| e.to_string())
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;
        Self::from_yaml_with_env(&yaml)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.server.address.is_empty() {
            return Err("server.address cannot be empty".to_string());
        }
        if self.server.fetch_timeout_secs == 0 {
            return Err("server.fetch_timeout_secs must be greater than 0".to_string());
        }

        self.cache.validate()?;

        if let Some(backend) = &self.backend {
            backend.endpoint()?;
            backend.credentials()?;
        }

        Ok(())
    }

    /// Runtime view shared by all requests
    pub fn proxy_config(&self) -> Result<ProxyConfig, String> {
        self.proxy_config_with(|name| std::env::var(name).ok())
    }

    pub fn proxy_config_with<F>(&self, lookup: F) -> Result<ProxyConfig, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend = match &self.backend {
            Some(backend) => Some(BackendSettings {
                endpoint: backend.endpoint()?,
                credentials: backend.credentials_with(lookup)?,
            }),
            None => None,
        };

        Ok(ProxyConfig {
            max_width: self.limits.max_width,
            max_height: self.limits.max_height,
            allow_list: self.allowed_hosts.clone(),
            backend,
        })
    }
}

/// Bucket and keys for signed fetches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendSettings {
    pub endpoint: BackendEndpoint,
    pub credentials: Credentials,
}

/// Read-only settings consulted on every request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxyConfig {
    /// 0 = unbounded
    pub max_width: u32,
    pub max_height: u32,
    pub allow_list: AllowList,
    pub backend: Option<BackendSettings>,
}

impl ProxyConfig {
    pub fn backend_endpoint(&self) -> Option<&BackendEndpoint> {
        self.backend.as_ref().map(|b| &b.endpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheMode;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_config_can_be_loaded_from_file_path() {
        let mut temp_file = NamedTempFile::new().unwrap();
        let config_yaml = r#"
server:
  address: "0.0.0.0"
  port: 9090
limits:
  max_width: 1000
allowed_hosts: "*.example.com,cdn.example.org"
cache:
  mode: memory
  max_size_mb: 64
logging:
  format: text
"#;
        temp_file.write_all(config_yaml.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = Config::from_file(temp_file.path()).unwrap();
        assert_eq!(config.server.listen_addr(), "0.0.0.0:9090");
        assert_eq!(config.limits.max_width, 1000);
        assert_eq!(config.limits.max_height, 2000);
        assert_eq!(
            config.allowed_hosts.patterns(),
            &["*.example.com", "cdn.example.org"]
        );
        assert_eq!(config.cache.mode, CacheMode::Memory);
        assert_eq!(config.logging.format, LogFormat::Text);
        assert!(config.backend.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = Config::from_yaml_with_lookup("{}", |_| None).unwrap();
        assert_eq!(config, Config::default());
        assert!(config.allowed_hosts.is_empty());
        assert_eq!(config.cache.mode, CacheMode::None);
    }

    #[test]
    fn test_env_substitution() {
        let yaml = "backend:\n  bucket: ${BUCKET}\n  access_key: ${AK}\n  secret_key: ${SK}\n";
        let config = Config::from_yaml_with_lookup(
            yaml,
            vars(&[("BUCKET", "media"), ("AK", "key"), ("SK", "secret")]),
        )
        .unwrap();
        let backend = config.backend.unwrap();
        assert_eq!(backend.bucket, "media");
        assert_eq!(backend.access_key.as_deref(), Some("key"));
    }

    #[test]
    fn test_missing_env_var_is_an_error() {
        let err = Config::from_yaml_with_lookup("allowed_hosts: ${HOSTS}", |_| None).unwrap_err();
        assert!(err.contains("HOSTS"), "{}", err);
    }

    #[test]
    fn test_unknown_cache_mode_rejected() {
        assert!(Config::from_yaml_with_lookup("cache:\n  mode: redis", |_| None).is_err());
    }

    #[test]
    fn test_disk_cache_without_dir_fails_validation() {
        let config = Config::from_yaml_with_lookup("cache:\n  mode: disk", |_| None).unwrap();
        assert!(config.validate().unwrap_err().contains("cache.dir"));
    }

    #[test]
    fn test_proxy_config_without_backend() {
        let config = Config::from_yaml_with_lookup(
            "limits:\n  max_width: 10\n  max_height: 0\nallowed_hosts:\n  - a.test\n",
            |_| None,
        )
        .unwrap();
        let proxy = config.proxy_config_with(|_| None).unwrap();
        assert_eq!(proxy.max_width, 10);
        assert_eq!(proxy.max_height, 0);
        assert!(proxy.allow_list.allows_host("a.test"));
        assert!(proxy.backend_endpoint().is_none());
    }

    #[test]
    fn test_proxy_config_with_backend_env_credentials() {
        let config = Config::from_yaml_with_lookup("backend:\n  bucket: media\n", |_| None).unwrap();
        let proxy = config
            .proxy_config_with(vars(&[(ACCESS_KEY_ENV, "AK"), (SECRET_KEY_ENV, "SK")]))
            .unwrap();
        let backend = proxy.backend.unwrap();
        assert_eq!(backend.endpoint.bucket(), "media");
        assert_eq!(backend.credentials, Credentials::new("AK", "SK"));
    }

    #[test]
    fn test_proxy_config_fails_without_credentials() {
        let config = Config::from_yaml_with_lookup("backend:\n  bucket: media\n", |_| None).unwrap();
        let err = config.proxy_config_with(|_| None).unwrap_err();
        assert!(err.contains(ACCESS_KEY_ENV), "{}", err);
    }
}

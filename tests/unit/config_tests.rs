// Configuration loading through the public API

use std::collections::HashMap;

use kagami::cache::CacheMode;
use kagami::config::*;
use kagami::s3::Credentials;

const FULL_CONFIG: &str = r#"
server:
  address: "0.0.0.0"
  port: 9000
  fetch_timeout_secs: 10
limits:
  max_width: 1200
  max_height: 0
allowed_hosts: "*.example.com,cdn.example.org"
cache:
  mode: disk
  dir: /var/cache/kagami
  max_size_mb: 64
  default_ttl_seconds: 120
backend:
  bucket: media
  region: eu-west-1
  access_key: ${KAGAMI_TEST_AK}
  secret_key: ${KAGAMI_TEST_SK}
logging:
  format: text
"#;

fn lookup(name: &str) -> Option<String> {
    let vars: HashMap<&str, &str> = [("KAGAMI_TEST_AK", "AKIDEXAMPLE"), ("KAGAMI_TEST_SK", "secret")]
        .into_iter()
        .collect();
    vars.get(name).map(|v| v.to_string())
}

#[test]
fn test_full_config_round_trip() {
    let config = Config::from_yaml_with_lookup(FULL_CONFIG, lookup).expect("config should parse");
    config.validate().expect("config should validate");

    assert_eq!(config.server.listen_addr(), "0.0.0.0:9000");
    assert_eq!(config.server.fetch_timeout().as_secs(), 10);
    assert_eq!(config.cache.mode, CacheMode::Disk);
    assert_eq!(config.cache.default_ttl().as_secs(), 120);
    assert_eq!(config.cache.max_size_bytes(), 64 * 1024 * 1024);
    assert_eq!(config.logging.format, LogFormat::Text);

    let proxy = config.proxy_config_with(|_| None).unwrap();
    assert_eq!(proxy.max_width, 1200);
    assert_eq!(proxy.max_height, 0);
    assert!(proxy.allow_list.allows_host("img.example.com"));
    assert!(!proxy.allow_list.allows_host("example.com"));

    let backend = proxy.backend.expect("backend configured");
    assert_eq!(backend.endpoint.region(), "eu-west-1");
    assert_eq!(backend.endpoint.host(), "media.s3.eu-west-1.amazonaws.com");
    assert_eq!(backend.credentials, Credentials::new("AKIDEXAMPLE", "secret"));
}

#[test]
fn test_unresolved_variable_fails_load() {
    let err = Config::from_yaml_with_lookup(FULL_CONFIG, |_| None).unwrap_err();
    assert!(err.contains("KAGAMI_TEST_AK"), "{}", err);
}

#[test]
fn test_custom_endpoint_switches_to_path_style() {
    let yaml = "backend:\n  bucket: media\n  endpoint: http://localhost:9000\n  access_key: a\n  secret_key: b\n";
    let config = Config::from_yaml_with_lookup(yaml, |_| None).unwrap();
    let endpoint = config.backend.unwrap().endpoint().unwrap();
    assert!(endpoint.is_path_style());
    assert_eq!(endpoint.host(), "localhost:9000");
    assert_eq!(
        endpoint.object_url("pics/a.jpg").unwrap().as_str(),
        "http://localhost:9000/media/pics/a.jpg"
    );
}

#[test]
fn test_missing_config_file() {
    let err = Config::from_file("/nonexistent/kagami.yaml").unwrap_err();
    assert!(err.contains("Failed to read config file"), "{}", err);
}

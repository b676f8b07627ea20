// Inbound request parsing and the directive codec through the public API

use kagami::error::ProxyError;
use kagami::options::{Rotation, TransformOptions};
use kagami::request::{AllowList, ImageRequest};
use kagami::s3::BackendEndpoint;

#[test]
fn test_backend_path_and_query() {
    let endpoint = BackendEndpoint::new("media", "us-east-1", None).unwrap();
    let req = ImageRequest::parse("/pics/summer%20day.jpg", Some("300x,r270"), Some(&endpoint))
        .unwrap();

    assert_eq!(
        req.url.as_str(),
        "https://media.s3.amazonaws.com/pics/summer%20day.jpg"
    );
    assert_eq!(req.options.width, 300.0);
    assert_eq!(req.options.height, 0.0);
    assert_eq!(req.options.rotate, Rotation::Cw270);
    assert_eq!(
        req.cache_key(),
        "https://media.s3.amazonaws.com/pics/summer%20day.jpg#300x0,r270"
    );
}

#[test]
fn test_backend_requires_object_path() {
    let endpoint = BackendEndpoint::new("media", "us-east-1", None).unwrap();
    let err = ImageRequest::parse("/", None, Some(&endpoint)).unwrap_err();
    assert!(matches!(err, ProxyError::BadRequest(_)));
}

#[test]
fn test_codec_round_trip_from_request() {
    let req = ImageRequest::parse("/fh,r180,fit,0.25x0.5/http://a.test/b.gif", None, None).unwrap();
    let encoded = req.options.encode();
    assert_eq!(TransformOptions::decode(&encoded).unwrap(), req.options);
    assert!(!encoded.contains(['#', '/', '?']));
}

#[test]
fn test_allow_list_checks_parsed_url() {
    let list = AllowList::parse("*.example.com");
    let ok = ImageRequest::parse("/http://img.example.com/a.png", None, None).unwrap();
    let bad = ImageRequest::parse("/http://img.example.com.evil.test/a.png", None, None).unwrap();
    assert!(list.allows(&ok.url));
    assert!(!list.allows(&bad.url));
}

// Shared helpers for integration tests: in-process transports, a loopback
// origin and synthetic images

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderName, HeaderValue};
use image::{DynamicImage, ImageOutputFormat, Rgba, RgbaImage};
use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use kagami::error::ProxyError;
use kagami::request::ImageRequest;
use kagami::transport::{ImageResponse, Transport};

/// Origin stand-in: answers every request with a clone of `response`
pub struct StubOrigin {
    response: Mutex<ImageResponse>,
    requests: Mutex<Vec<ImageRequest>>,
}

impl StubOrigin {
    pub fn new(response: ImageResponse) -> Self {
        Self {
            response: Mutex::new(response),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ImageRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for StubOrigin {
    async fn round_trip(&self, request: &ImageRequest) -> Result<ImageResponse, ProxyError> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(self.response.lock().unwrap().clone())
    }
}

/// Request head as received by [`LocalOrigin`]
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// e.g. `GET /media/a.png HTTP/1.1`
    pub line: String,
    /// Lowercased names, in arrival order
    pub headers: Vec<(String, String)>,
}

impl RecordedRequest {
    fn parse(raw: &str) -> Self {
        let mut lines = raw.split("\r\n");
        let line = lines.next().unwrap_or_default().to_string();
        let headers = lines
            .filter_map(|l| l.split_once(':'))
            .map(|(n, v)| (n.trim().to_ascii_lowercase(), v.trim().to_string()))
            .collect();
        Self { line, headers }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn count(&self, name: &str) -> usize {
        self.headers.iter().filter(|(n, _)| n == name).count()
    }
}

/// HTTP/1.1 origin on 127.0.0.1 that answers every connection with the same
/// canned response and closes it
pub struct LocalOrigin {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl LocalOrigin {
    pub async fn start(status: u16, headers: &[(&str, &str)], body: Bytes) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let reason = http::StatusCode::from_u16(status)
            .unwrap()
            .canonical_reason()
            .unwrap_or("");
        let mut head = format!("HTTP/1.1 {} {}\r\nconnection: close\r\n", status, reason);
        for (name, value) in headers {
            head.push_str(&format!("{}: {}\r\n", name, value));
        }
        if status != 204 && status != 304 {
            head.push_str(&format!("content-length: {}\r\n", body.len()));
        }
        head.push_str("\r\n");
        let mut reply = head.into_bytes();
        reply.extend_from_slice(&body);

        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = requests.clone();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let raw = read_head(&mut socket).await;
                recorded.lock().unwrap().push(RecordedRequest::parse(&raw));
                let _ = socket.write_all(&reply).await;
                let _ = socket.shutdown().await;
            }
        });

        Self { addr, requests }
    }

    /// `http://127.0.0.1:{port}`
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

async fn read_head(socket: &mut TcpStream) -> String {
    let mut raw = Vec::new();
    let mut buf = [0u8; 1024];
    while !raw.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => raw.extend_from_slice(&buf[..n]),
        }
    }
    String::from_utf8_lossy(&raw).into_owned()
}

/// `width` x `height` PNG, left half red and right half blue
pub fn png(width: u32, height: u32) -> Bytes {
    let img = RgbaImage::from_fn(width, height, |x, _| {
        if x < width / 2 {
            Rgba([255, 0, 0, 255])
        } else {
            Rgba([0, 0, 255, 255])
        }
    });
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img)
        .write_to(&mut out, ImageOutputFormat::Png)
        .unwrap();
    Bytes::from(out.into_inner())
}

pub fn dimensions(data: &[u8]) -> (u32, u32) {
    let img = image::load_from_memory(data).unwrap();
    (img.width(), img.height())
}

pub fn response_with(body: Bytes, headers: &[(&str, &str)]) -> ImageResponse {
    let mut response = ImageResponse::ok(body);
    for (name, value) in headers {
        response.headers.insert(
            HeaderName::from_bytes(name.as_bytes()).unwrap(),
            HeaderValue::from_str(value).unwrap(),
        );
    }
    response
}

pub fn get(uri: &str) -> http::request::Parts {
    request("GET", uri, &[])
}

pub fn request(method: &str, uri: &str, headers: &[(&str, &str)]) -> http::request::Parts {
    let mut builder = http::Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(()).unwrap().into_parts().0
}

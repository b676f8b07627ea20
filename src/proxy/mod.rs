// Proxy module - Pingora ProxyHttp implementation
// Every request is answered from request_filter; Pingora never connects upstream.

use async_trait::async_trait;
use pingora_core::upstreams::peer::HttpPeer;
use pingora_core::Result;
use pingora_http::ResponseHeader;
use pingora_proxy::{ProxyHttp, Session};
use std::sync::Arc;

pub mod dispatcher;

pub use dispatcher::{check_not_modified, error_response, Dispatch, Dispatcher};

use crate::cache::build_cache;
use crate::config::Config;
use crate::error::ProxyError;
use crate::pipeline::RequestContext;
use crate::s3::ObjectStoreFetcher;
use crate::transport::fetch::build_client;
use crate::transport::{build_chain, HttpFetcher, Transport};

/// ImageProxy implements the Pingora ProxyHttp trait
pub struct ImageProxy {
    dispatcher: Dispatcher,
}

impl ImageProxy {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }

    /// Wire the fetch chain described by `config`
    ///
    /// Must run inside a tokio runtime: the disk cache creates its directory
    /// asynchronously.
    pub async fn from_config(config: &Config) -> std::result::Result<Self, ProxyError> {
        let proxy_config = config.proxy_config().map_err(ProxyError::Config)?;
        let client = build_client(config.server.fetch_timeout())?;
        let max_body_bytes = config.server.max_body_bytes();

        let fetcher: Arc<dyn Transport> = match &proxy_config.backend {
            Some(backend) => Arc::new(
                ObjectStoreFetcher::new(
                    client,
                    backend.endpoint.clone(),
                    backend.credentials.clone(),
                )
                .with_body_limit(max_body_bytes),
            ),
            None => Arc::new(HttpFetcher::with_client(client).with_body_limit(max_body_bytes)),
        };

        let cache = build_cache(&config.cache)
            .await
            .map_err(|e| ProxyError::Config(e.to_string()))?;

        tracing::info!(
            backend = proxy_config.backend_endpoint().map(|e| e.bucket()).unwrap_or("none"),
            cache_mode = ?config.cache.mode,
            allowed_hosts = proxy_config.allow_list.patterns().len(),
            max_width = proxy_config.max_width,
            max_height = proxy_config.max_height,
            "Fetch chain ready"
        );

        let chain = build_chain(fetcher, cache, config.cache.default_ttl());
        Ok(Self::new(Dispatcher::new(Arc::new(proxy_config), chain)))
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }
}

#[async_trait]
impl ProxyHttp for ImageProxy {
    type CTX = RequestContext;

    fn new_ctx(&self) -> Self::CTX {
        RequestContext::default()
    }

    /// Never reached: request_filter always writes the response
    async fn upstream_peer(
        &self,
        _session: &mut Session,
        _ctx: &mut Self::CTX,
    ) -> Result<Box<HttpPeer>> {
        Err(pingora_core::Error::explain(
            pingora_core::ErrorType::InternalError,
            "requests are answered by the fetch chain, not proxied",
        ))
    }

    async fn request_filter(&self, session: &mut Session, ctx: &mut Self::CTX) -> Result<bool> {
        let req = session.req_header();
        ctx.set_request_line(req.method.as_str(), req.uri.path());

        let dispatch = self.dispatcher.handle(req).await;
        if let Some(request) = &dispatch.request {
            ctx.set_target(request.url.as_str(), request.options.encode());
        }
        ctx.set_from_cache(dispatch.from_cache());

        let response = dispatch.response;
        let mut header =
            ResponseHeader::build(response.status.as_u16(), Some(response.headers.len() + 1))?;
        // Use append_header instead of insert_header to avoid lifetime issues
        for (name, value) in response.headers.iter() {
            header.append_header(name.clone(), value.clone())?;
        }
        header.insert_header("X-Request-ID", ctx.request_id().to_string())?;

        let end_of_stream = response.body.is_empty();
        session
            .write_response_header(Box::new(header), end_of_stream)
            .await?;
        if !end_of_stream {
            session
                .write_response_body(Some(response.body), true)
                .await?;
        }

        // Response already sent, short-circuit the upstream phase
        Ok(true)
    }

    async fn logging(
        &self,
        session: &mut Session,
        _e: Option<&pingora_core::Error>,
        ctx: &mut Self::CTX,
    ) {
        let status_code = if let Some(resp) = session.response_written() {
            resp.status.as_u16()
        } else {
            500
        };
        let duration_ms = ctx.elapsed().as_millis() as u64;

        if status_code >= 400 {
            tracing::warn!(
                request_id = %ctx.request_id(),
                method = %ctx.method(),
                path = %ctx.path(),
                url = ctx.target_url().unwrap_or("-"),
                status_code = status_code,
                duration_ms = duration_ms,
                "Request failed"
            );
        } else {
            tracing::info!(
                request_id = %ctx.request_id(),
                method = %ctx.method(),
                path = %ctx.path(),
                url = ctx.target_url().unwrap_or("-"),
                directives = %ctx.directives(),
                status_code = status_code,
                from_cache = ctx.from_cache(),
                duration_ms = duration_ms,
                "Request completed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheMode;

    #[tokio::test]
    async fn test_from_config_direct_mode() {
        let config = Config::default();
        let proxy = ImageProxy::from_config(&config).await.unwrap();
        assert!(proxy.dispatcher().config().backend.is_none());
        assert_eq!(proxy.dispatcher().config().max_width, 2000);
    }

    #[tokio::test]
    async fn test_from_config_backend_mode() {
        let config = Config::from_yaml_with_lookup(
            "backend:\n  bucket: media\n  access_key: AK\n  secret_key: SK\n",
            |_| None,
        )
        .unwrap();
        let proxy = ImageProxy::from_config(&config).await.unwrap();
        let endpoint = proxy.dispatcher().config().backend_endpoint().unwrap();
        assert_eq!(endpoint.bucket(), "media");
    }

    #[tokio::test]
    async fn test_from_config_disk_cache() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.cache.mode = CacheMode::Disk;
        config.cache.dir = Some(dir.path().to_path_buf());
        assert!(ImageProxy::from_config(&config).await.is_ok());
    }
}

//! Live HTTP fetches for the offline layer.
//!
//! ### Transport failures only
//! - DNS, connect, timeout and body-read failures become `NetworkUnavailable`
//! - HTTP error statuses are returned as ordinary responses
//!
//! ### Strategy fetches
//! - Conditional and range request headers are dropped, so the upstream
//!   always sends a full body that can be stored
//! - No-store fetches send `Cache-Control: no-cache, no-store, must-revalidate`
//!   and `Pragma: no-cache`
//! - Bodies are buffered up to `max_bytes` (default: 512MB)
//!
//! ### Pass-through
//! - Request and response bodies are streamed, never buffered or limited
//! - Response bodies are not decompressed; headers reach the caller as sent
//!
//! ### Limits
//! - Max redirects: 5 (configurable)

use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{Stream, TryStream};
use reqwest::{Client, ClientBuilder, Method, RequestBuilder, header};

use offline_core::request::is_hop_by_hop;
use offline_core::{AppConfig, Error, FetchOptions, Headers, Network, RequestDescriptor, Response};

/// Cache-Control directives sent with no-store fetches.
const NO_STORE_DIRECTIVES: &str = "no-cache, no-store, must-revalidate";

/// Request headers that let the upstream answer 304 or 206.
const CONDITIONAL_HEADERS: &[&str] =
    &["if-none-match", "if-modified-since", "if-match", "if-unmodified-since", "if-range", "range"];

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string used when the request carries none (default: "offline-proxy/0.1")
    pub user_agent: String,

    /// Maximum body size in bytes a strategy fetch buffers (default: 512MB)
    pub max_bytes: usize,

    /// Request timeout for strategy fetches, connect timeout for
    /// pass-through (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "offline-proxy/0.1".to_string(),
            max_bytes: 512 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
        }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            max_redirects: config.max_redirects,
        }
    }
}

/// A pass-through response whose body is still being received.
pub struct Forwarded {
    pub status: u16,
    /// End-to-end headers, including `Content-Length` when the upstream sent one.
    pub headers: Headers,
    response: reqwest::Response,
}

impl Forwarded {
    pub fn into_body_stream(self) -> impl Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static {
        self.response.bytes_stream()
    }
}

/// HTTP client implementing [`Network`].
pub struct FetchClient {
    http: Client,
    passthrough: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = base_builder(&config)
            .timeout(config.timeout)
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::NetworkUnavailable(format!("failed to build HTTP client: {e}")))?;

        let passthrough = base_builder(&config)
            .connect_timeout(config.timeout)
            .no_gzip()
            .no_brotli()
            .no_deflate()
            .build()
            .map_err(|e| Error::NetworkUnavailable(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, passthrough, config })
    }

    /// Forward a request to the network, bypassing every cache rule.
    ///
    /// Used by hosts for pass-through traffic of any method. Every
    /// end-to-end request header is kept, and both bodies stream.
    pub async fn forward<S>(&self, request: &RequestDescriptor, body: Option<S>) -> Result<Forwarded, Error>
    where
        S: TryStream + Send + 'static,
        S::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
        Bytes: From<S::Ok>,
    {
        let method = parse_method(request)?;
        let mut builder = self.passthrough.request(method, request.url().clone());
        for (name, value) in request.headers().iter() {
            if is_hop_by_hop(name) || name == "host" {
                continue;
            }
            if name == "content-length" && body.is_none() {
                continue;
            }
            builder = builder.header(name, value);
        }
        if let Some(body) = body {
            builder = builder.body(reqwest::Body::wrap_stream(body));
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::NetworkUnavailable(format!("{}: {e}", request.url())))?;

        tracing::debug!(
            method = request.method(),
            url = %request.url(),
            status = response.status().as_u16(),
            "forwarded"
        );

        Ok(Forwarded { status: response.status().as_u16(), headers: response_headers(&response), response })
    }

    async fn send(&self, request: &RequestDescriptor, options: FetchOptions) -> Result<Response, Error> {
        let start = Instant::now();
        let builder = self.strategy_request(request, options)?;

        let response = builder
            .send()
            .await
            .map_err(|e| Error::NetworkUnavailable(format!("{}: {e}", request.url())))?;

        let status = response.status();

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", len, self.config.max_bytes)));
        }

        let headers = response_headers(&response);

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::NetworkUnavailable(format!("failed to read response: {e}")))?;

        if bytes.len() > self.config.max_bytes {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", bytes.len(), self.config.max_bytes)));
        }

        tracing::debug!(
            "fetched {} {} -> {} in {}ms ({} bytes)",
            request.method(),
            request.url(),
            status.as_u16(),
            start.elapsed().as_millis(),
            bytes.len()
        );

        Ok(Response::new(status.as_u16(), headers, bytes))
    }

    fn strategy_request(&self, request: &RequestDescriptor, options: FetchOptions) -> Result<RequestBuilder, Error> {
        let mut builder = self.http.request(parse_method(request)?, request.url().clone());
        for (name, value) in request.headers().iter() {
            if is_hop_by_hop(name) || name == "host" || name == "content-length" {
                continue;
            }
            if CONDITIONAL_HEADERS.contains(&name) {
                continue;
            }
            if options.no_store && (name == "cache-control" || name == "pragma") {
                continue;
            }
            builder = builder.header(name, value);
        }
        if options.no_store {
            builder = builder
                .header(header::CACHE_CONTROL, NO_STORE_DIRECTIVES)
                .header(header::PRAGMA, "no-cache");
        }
        Ok(builder)
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

fn base_builder(config: &FetchConfig) -> ClientBuilder {
    Client::builder()
        .user_agent(&config.user_agent)
        .redirect(redirect_policy(config.max_redirects))
        .use_rustls_tls()
}

fn parse_method(request: &RequestDescriptor) -> Result<Method, Error> {
    Method::from_bytes(request.method().as_bytes())
        .map_err(|e| Error::InvalidRequest(format!("method {}: {e}", request.method())))
}

fn response_headers(response: &reqwest::Response) -> Headers {
    response
        .headers()
        .iter()
        .filter(|(name, _)| !is_hop_by_hop(name.as_str()))
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
        .collect()
}

/// Zero disables following, so redirects reach the caller unchanged.
fn redirect_policy(max_redirects: usize) -> reqwest::redirect::Policy {
    if max_redirects == 0 {
        reqwest::redirect::Policy::none()
    } else {
        reqwest::redirect::Policy::limited(max_redirects)
    }
}

#[async_trait]
impl Network for FetchClient {
    async fn fetch(&self, request: &RequestDescriptor, options: FetchOptions) -> Result<Response, Error> {
        self.send(request, options).await
    }
}

//! HTTP fetch seam between the engine and the upstream origin.
//!
//! ### Contract
//! - `Ok` means a response arrived, whatever its status. Callers decide
//!   which statuses are cacheable.
//! - `Err(Error::Network)` means no response at all (DNS, connect, TLS,
//!   timeout). This is the "offline" signal.
//!
//! ### Headers
//! - Hop-by-hop request headers are not forwarded upstream, nor is the
//!   client's `accept-encoding`: reqwest negotiates only encodings it decodes.
//! - Bodies are decoded by reqwest, so encoding/length headers are dropped
//!   from stored copies.

pub mod url;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Method, StatusCode, Url, header};
use std::time::{Duration, Instant};

use lantern_core::{Error, StoredResponse};

/// Request headers never forwarded upstream.
const HOP_BY_HOP: &[&str] = &[
    "accept-encoding",
    "connection",
    "host",
    "keep-alive",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "content-length",
];

/// Response headers that no longer describe a decoded body.
const STALE_RESPONSE_HEADERS: &[&str] = &["content-encoding", "content-length", "transfer-encoding", "connection"];

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "lantern/0.1")
    pub user_agent: String,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { user_agent: "lantern/0.1".to_string(), timeout: Duration::from_millis(20000), max_redirects: 5 }
    }
}

/// An outgoing request.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub method: Method,
    pub url: Url,
    pub headers: header::HeaderMap,
    pub body: Bytes,
}

impl FetchRequest {
    pub fn get(url: Url) -> Self {
        Self { method: Method::GET, url, headers: header::HeaderMap::new(), body: Bytes::new() }
    }
}

/// Response from a fetch operation.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// The URL requested
    pub url: Url,
    /// HTTP status code
    pub status: StatusCode,
    /// Response headers
    pub headers: header::HeaderMap,
    /// Response body bytes
    pub bytes: Bytes,
    /// Time taken to fetch in milliseconds
    pub fetch_ms: u64,
}

impl FetchResponse {
    /// Exactly HTTP 200.
    pub fn is_ok(&self) -> bool {
        self.status == StatusCode::OK
    }

    /// Copy suitable for the store and for serving back verbatim.
    pub fn to_stored(&self) -> StoredResponse {
        let headers = self
            .headers
            .iter()
            .filter(|(name, _)| !STALE_RESPONSE_HEADERS.contains(&name.as_str()))
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
            .collect();

        StoredResponse { status: self.status.as_u16(), headers, body: self.bytes.to_vec() }
    }
}

/// Anything that can perform a request against the network.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, Error>;

    async fn get(&self, url: Url) -> Result<FetchResponse, Error> {
        self.fetch(FetchRequest::get(url)).await
    }
}

/// reqwest-backed fetcher.
pub struct HttpFetcher {
    http: Client,
}

impl HttpFetcher {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: &FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http })
    }
}

fn forwardable(headers: &header::HeaderMap) -> header::HeaderMap {
    let mut out = header::HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        if !HOP_BY_HOP.contains(&name.as_str()) {
            out.append(name.clone(), value.clone());
        }
    }
    out
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, Error> {
        let start = Instant::now();
        let FetchRequest { method, url, headers, body } = request;

        let response = self
            .http
            .request(method.clone(), url.clone())
            .headers(forwardable(&headers))
            .body(body)
            .send()
            .await
            .map_err(|e| Error::Network(format!("{method} {url}: {e}")))?;

        let status = response.status();
        let headers = response.headers().clone();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Network(format!("failed to read response: {}", e)))?;

        let fetch_ms = start.elapsed().as_millis() as u64;

        tracing::debug!(%method, %url, status = status.as_u16(), fetch_ms, bytes = bytes.len(), "fetched upstream");

        Ok(FetchResponse { url, status, headers, bytes, fetch_ms })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: StatusCode) -> FetchResponse {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, "text/html".parse().unwrap());
        headers.insert(header::CONTENT_ENCODING, "gzip".parse().unwrap());
        headers.insert(header::CONTENT_LENGTH, "12".parse().unwrap());
        FetchResponse {
            url: Url::parse("https://example.com/about").unwrap(),
            status,
            headers,
            bytes: Bytes::from_static(b"<h1>about</h1>"),
            fetch_ms: 3,
        }
    }

    #[test]
    fn test_fetch_config_default() {
        let config = FetchConfig::default();
        assert_eq!(config.user_agent, "lantern/0.1");
        assert_eq!(config.timeout, Duration::from_millis(20000));
        assert_eq!(config.max_redirects, 5);
    }

    #[test]
    fn test_is_ok_only_for_200() {
        assert!(response(StatusCode::OK).is_ok());
        assert!(!response(StatusCode::NO_CONTENT).is_ok());
        assert!(!response(StatusCode::NOT_FOUND).is_ok());
    }

    #[test]
    fn test_to_stored_drops_encoding_headers() {
        let stored = response(StatusCode::OK).to_stored();
        assert_eq!(stored.status, 200);
        assert_eq!(stored.body, b"<h1>about</h1>");
        assert_eq!(stored.header("content-type"), Some("text/html"));
        assert_eq!(stored.header("content-encoding"), None);
        assert_eq!(stored.header("content-length"), None);
    }

    #[test]
    fn test_forwardable_strips_hop_by_hop() {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::HOST, "127.0.0.1:8787".parse().unwrap());
        headers.insert(header::CONNECTION, "keep-alive".parse().unwrap());
        headers.insert(header::ACCEPT, "text/html".parse().unwrap());

        let out = forwardable(&headers);
        assert_eq!(out.len(), 1);
        assert!(out.contains_key(header::ACCEPT));
    }

    #[test]
    fn test_forwardable_strips_accept_encoding() {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::ACCEPT_ENCODING, "zstd, br".parse().unwrap());
        headers.insert(header::ACCEPT_LANGUAGE, "fi".parse().unwrap());

        let out = forwardable(&headers);
        assert!(!out.contains_key(header::ACCEPT_ENCODING));
        assert!(out.contains_key(header::ACCEPT_LANGUAGE));
    }

    #[tokio::test]
    async fn test_http_fetcher_new() {
        assert!(HttpFetcher::new(&FetchConfig::default()).is_ok());
    }
}

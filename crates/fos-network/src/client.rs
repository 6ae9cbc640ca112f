//! HTTP Client
//!
//! Minimal HTTP/1.1 GET client on hyper + tokio, used to fetch filter
//! lists. Features:
//! - HTTPS with rustls and the webpki root store
//! - Connect and whole-request timeouts
//! - Response bodies capped at `max_body_size`
//! - Optional request filter consulted before any network activity

use fos_adblock::{RequestFilter, Verdict};
use http_body_util::{BodyExt, Empty, LengthLimitError, Limited};
use hyper::body::{Bytes, Incoming};
use hyper::header::{HeaderMap, CONTENT_TYPE, HOST, USER_AGENT};
use hyper::{Method, Request, StatusCode, Uri};
use hyper_util::rt::TokioIo;
use rustls::ClientConfig;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::{debug, info, warn};

/// HTTP client errors
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("Request blocked: {0}")]
    Blocked(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timeout")]
    Timeout,

    #[error("HTTP status {0}")]
    HttpStatus(u16),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("TLS error: {0}")]
    TlsError(String),

    #[error("Body read error: {0}")]
    BodyError(String),

    #[error("Response body exceeds {0} bytes")]
    BodyTooLarge(usize),
}

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Whole-request timeout, connect included
    pub timeout: Duration,
    /// TCP connect timeout
    pub connect_timeout: Duration,
    pub user_agent: String,
    /// Maximum response body size
    pub max_body_size: usize,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            connect_timeout: Duration::from_secs(5),
            user_agent: "fOS-WB/0.1 (filter updater)".to_string(),
            max_body_size: 10 * 1024 * 1024, // 10 MB
        }
    }
}

/// HTTP response
#[derive(Debug)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Time to first byte
    pub ttfb: Duration,
    pub total_time: Duration,
}

impl Response {
    /// Check if response was successful (2xx)
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Body as UTF-8 text
    pub fn text(&self) -> Result<String, std::str::Utf8Error> {
        std::str::from_utf8(&self.body).map(str::to_string)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE)?.to_str().ok()
    }
}

/// Client statistics
#[derive(Debug, Default)]
pub struct ClientStats {
    pub requests_made: AtomicU64,
    pub requests_blocked: AtomicU64,
    pub bytes_downloaded: AtomicU64,
}

/// HTTP client with optional content blocking
pub struct HttpClient {
    config: HttpClientConfig,
    tls: TlsConnector,
    filter: Option<Arc<RequestFilter>>,
    stats: ClientStats,
}

impl HttpClient {
    pub fn new(config: HttpClientConfig) -> Self {
        let mut root_store = rustls::RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let tls_config = ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth();

        info!(
            "HTTP client initialized (timeout: {:?}, max body: {} KB)",
            config.timeout,
            config.max_body_size / 1024
        );

        Self {
            config,
            tls: TlsConnector::from(Arc::new(tls_config)),
            filter: None,
            stats: ClientStats::default(),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(HttpClientConfig::default())
    }

    /// Consult `filter` before every request
    pub fn set_filter(&mut self, filter: Arc<RequestFilter>) {
        self.filter = Some(filter);
    }

    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// Perform a GET request within the configured timeout
    pub async fn get(&self, url: &str) -> Result<Response, HttpError> {
        self.stats.requests_made.fetch_add(1, Ordering::Relaxed);

        // Check the filter BEFORE any network activity
        if let Some(filter) = &self.filter {
            if let Verdict::Block(reason) = filter.check(url) {
                self.stats.requests_blocked.fetch_add(1, Ordering::Relaxed);
                debug!("Request blocked by filter: {} - {}", url, reason);
                return Err(HttpError::Blocked(reason.to_string()));
            }
        }

        tokio::time::timeout(self.config.timeout, self.fetch(url))
            .await
            .map_err(|_| HttpError::Timeout)?
    }

    async fn fetch(&self, url: &str) -> Result<Response, HttpError> {
        let start = Instant::now();

        let uri: Uri = url
            .parse()
            .map_err(|e: hyper::http::uri::InvalidUri| HttpError::InvalidUrl(e.to_string()))?;
        let is_https = match uri.scheme_str() {
            Some("https") => true,
            Some("http") => false,
            other => {
                return Err(HttpError::InvalidUrl(format!("Unsupported scheme: {:?}", other)));
            }
        };
        let host = uri
            .host()
            .ok_or_else(|| HttpError::InvalidUrl("No host in URL".to_string()))?;
        let port = uri.port_u16().unwrap_or(if is_https { 443 } else { 80 });

        // Origin-form target; the authority goes in the Host header
        let target = uri.path_and_query().map_or("/", |pq| pq.as_str());
        let host_header = match uri.port_u16() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };
        let request = Request::builder()
            .method(Method::GET)
            .uri(target)
            .header(HOST, host_header)
            .header(USER_AGENT, &self.config.user_agent)
            .body(Empty::<Bytes>::new())
            .map_err(|e| HttpError::Protocol(e.to_string()))?;

        let addr = format!("{}:{}", host, port);
        let stream = tokio::time::timeout(self.config.connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| HttpError::Timeout)?
            .map_err(|e| HttpError::ConnectionFailed(e.to_string()))?;

        let ttfb_start = Instant::now();
        let response = if is_https {
            let server_name = rustls::pki_types::ServerName::try_from(host.to_string())
                .map_err(|_| HttpError::TlsError("Invalid server name".to_string()))?;
            let tls_stream = self
                .tls
                .connect(server_name, stream)
                .await
                .map_err(|e| HttpError::TlsError(e.to_string()))?;
            send_request(tls_stream, request).await?
        } else {
            send_request(stream, request).await?
        };
        let ttfb = ttfb_start.elapsed();

        let status = response.status();
        let headers = response.headers().clone();

        let limit = self.config.max_body_size;
        let body = Limited::new(response.into_body(), limit)
            .collect()
            .await
            .map_err(|e| {
                if e.downcast_ref::<LengthLimitError>().is_some() {
                    HttpError::BodyTooLarge(limit)
                } else {
                    HttpError::BodyError(e.to_string())
                }
            })?
            .to_bytes();

        self.stats
            .bytes_downloaded
            .fetch_add(body.len() as u64, Ordering::Relaxed);

        debug!(
            "HTTP GET {} -> {} ({} bytes, {:?} TTFB)",
            url,
            status,
            body.len(),
            ttfb
        );

        Ok(Response {
            status,
            headers,
            body,
            ttfb,
            total_time: start.elapsed(),
        })
    }

    /// (requests made, requests blocked, bytes downloaded)
    pub fn stats(&self) -> (u64, u64, u64) {
        (
            self.stats.requests_made.load(Ordering::Relaxed),
            self.stats.requests_blocked.load(Ordering::Relaxed),
            self.stats.bytes_downloaded.load(Ordering::Relaxed),
        )
    }
}

/// HTTP/1.1 handshake over `stream` and send one request
async fn send_request<S>(
    stream: S,
    request: Request<Empty<Bytes>>,
) -> Result<hyper::Response<Incoming>, HttpError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let io = TokioIo::new(stream);
    let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
        .await
        .map_err(|e| HttpError::Protocol(e.to_string()))?;

    tokio::spawn(async move {
        if let Err(e) = conn.await {
            warn!("Connection error: {}", e);
        }
    });

    sender
        .send_request(request)
        .await
        .map_err(|e| HttpError::Protocol(e.to_string()))
}

#[cfg(test)]
pub(crate) mod test_server {
    //! One-shot local HTTP server for client and updater tests

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve `response` verbatim to each connection; returns the base URL
    pub(crate) async fn serve(response: String) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let response = response.clone();
                tokio::spawn(async move {
                    let mut buf = [0u8; 4096];
                    let _ = socket.read(&mut buf).await;
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        format!("http://{}", addr)
    }

    pub(crate) fn ok(body: &str) -> String {
        format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\n\
             Content-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        )
    }

    pub(crate) fn status(code: u16, reason: &str) -> String {
        format!("HTTP/1.1 {} {}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n", code, reason)
    }

    /// Accepts connections and never answers
    pub(crate) async fn silent() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });
        format!("http://{}", addr)
    }
}

#[cfg(test)]
mod tests {
    use super::test_server::{ok, serve, silent, status};
    use super::*;
    use fos_adblock::AdblockConfig;

    #[tokio::test]
    async fn test_get_local_server() {
        let base = serve(ok("||ads.example.com^\n")).await;
        let client = HttpClient::with_defaults();

        let response = client.get(&format!("{}/filters.txt?v=1", base)).await.unwrap();
        assert!(response.is_success());
        assert_eq!(response.text().unwrap(), "||ads.example.com^\n");
        assert_eq!(response.content_type(), Some("text/plain"));
        assert_eq!(client.stats(), (1, 0, 19));
    }

    #[tokio::test]
    async fn test_error_status_is_returned() {
        let base = serve(status(404, "Not Found")).await;
        let client = HttpClient::with_defaults();

        let response = client.get(&base).await.unwrap();
        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert!(!response.is_success());
    }

    #[tokio::test]
    async fn test_body_limit() {
        let base = serve(ok(&"x".repeat(2048))).await;
        let client = HttpClient::new(HttpClientConfig {
            max_body_size: 1024,
            ..Default::default()
        });

        assert!(matches!(client.get(&base).await, Err(HttpError::BodyTooLarge(1024))));
    }

    #[tokio::test]
    async fn test_timeout() {
        let base = silent().await;
        let client = HttpClient::new(HttpClientConfig {
            timeout: Duration::from_millis(200),
            ..Default::default()
        });

        assert!(matches!(client.get(&base).await, Err(HttpError::Timeout)));
    }

    #[tokio::test]
    async fn test_invalid_urls() {
        let client = HttpClient::with_defaults();
        assert!(matches!(client.get("not a url").await, Err(HttpError::InvalidUrl(_))));
        assert!(matches!(
            client.get("ftp://example.com/list").await,
            Err(HttpError::InvalidUrl(_))
        ));
    }

    #[tokio::test]
    async fn test_blocked_request() {
        let filter = RequestFilter::from_config(&AdblockConfig::default(), None);
        let mut client = HttpClient::with_defaults();
        client.set_filter(filter);

        // nothing loaded yet: the hardcoded tables answer
        let result = client.get("https://stats.doubleclick.net/ad.js").await;
        assert!(matches!(result, Err(HttpError::Blocked(_))));
        assert_eq!(client.stats().1, 1);
    }
}

//! Client for the remote search and archive services.
//!
//! [`SearchService`] is the seam the session talks through;
//! [`HttpSearchService`] implements it over a single JSON `POST` endpoint.
//! Unlike the browser client it replaces, every request carries a timeout
//! and non-success statuses surface as errors instead of never resolving.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, warn};

use crate::model::types::ArchiveSummary;
use crate::protocol::{
    ARCHIVE_LIST_REQUEST, ArchiveRequest, ArchiveResponse, SearchRequest, SearchResponse,
    decode_archive_list,
};

/// Transport-level failures.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("could not reach search service: {0}")]
    Unavailable(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("search service returned HTTP {status}")]
    Status { status: u16 },

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("failed to encode request: {0}")]
    Encode(String),
}

impl ServiceError {
    /// Whether re-issuing the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ServiceError::Unavailable(_) | ServiceError::Timeout(_) => true,
            ServiceError::Status { status } => *status >= 500,
            ServiceError::Decode(_) | ServiceError::Encode(_) => false,
        }
    }
}

/// The two remote collaborators of a search session.
pub trait SearchService {
    /// Run a query against an archive.
    fn search(
        &self,
        request: &SearchRequest,
    ) -> impl Future<Output = Result<SearchResponse, ServiceError>> + Send;

    /// Fetch the metadata of one archive.
    fn fetch_archive(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<ArchiveResponse, ServiceError>> + Send;

    /// Fetch the list of searchable archives.
    fn fetch_archives(
        &self,
    ) -> impl Future<Output = Result<Vec<ArchiveSummary>, ServiceError>> + Send;
}

/// Connection settings for [`HttpSearchService`].
#[derive(Debug, Clone)]
pub struct ServiceClientConfig {
    pub base_url: String,
    pub request_timeout: Duration,
}

impl Default for ServiceClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:31337/".to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// HTTP implementation of [`SearchService`].
pub struct HttpSearchService {
    client: Client,
    config: ServiceClientConfig,
    request_counter: AtomicU64,
}

impl HttpSearchService {
    pub fn new(config: ServiceClientConfig) -> Result<Self, ServiceError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("subsearch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ServiceError::Unavailable(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            config,
            request_counter: AtomicU64::new(0),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    async fn post<T: DeserializeOwned>(&self, kind: &str, body: String) -> Result<T, ServiceError> {
        self.post_with(kind, body, |bytes| serde_json::from_slice(bytes))
            .await
    }

    /// Send `body` and decode a successful response with `decode`.
    async fn post_with<T>(
        &self,
        kind: &str,
        body: String,
        decode: impl FnOnce(&[u8]) -> Result<T, serde_json::Error>,
    ) -> Result<T, ServiceError> {
        let request_id = self.request_counter.fetch_add(1, Ordering::Relaxed);
        let started = Instant::now();
        debug!(request_id, kind, bytes = body.len(), "service request");

        let response = self
            .client
            .post(&self.config.base_url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            warn!(request_id, kind, status = status.as_u16(), "service returned error status");
            return Err(ServiceError::Status {
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await.map_err(|e| self.transport_error(e))?;
        debug!(
            request_id,
            kind,
            bytes = bytes.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "service response"
        );
        decode(&bytes).map_err(|e| ServiceError::Decode(e.to_string()))
    }

    fn transport_error(&self, e: reqwest::Error) -> ServiceError {
        if e.is_timeout() {
            ServiceError::Timeout(self.config.request_timeout)
        } else {
            ServiceError::Unavailable(e.to_string())
        }
    }
}

fn encode<T: serde::Serialize>(value: &T) -> Result<String, ServiceError> {
    serde_json::to_string(value).map_err(|e| ServiceError::Encode(e.to_string()))
}

impl SearchService for HttpSearchService {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, ServiceError> {
        self.post("search", encode(request)?).await
    }

    async fn fetch_archive(&self, name: &str) -> Result<ArchiveResponse, ServiceError> {
        self.post("get_archive", encode(&ArchiveRequest::new(name))?)
            .await
    }

    async fn fetch_archives(&self) -> Result<Vec<ArchiveSummary>, ServiceError> {
        self.post_with(
            "get_archives",
            ARCHIVE_LIST_REQUEST.to_string(),
            decode_archive_list,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = ServiceClientConfig::default();
        assert_eq!(config.base_url, "http://127.0.0.1:31337/");
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn retryable_classification() {
        assert!(ServiceError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(ServiceError::Unavailable("refused".into()).is_retryable());
        assert!(ServiceError::Status { status: 503 }.is_retryable());
        assert!(!ServiceError::Status { status: 404 }.is_retryable());
        assert!(!ServiceError::Decode("eof".into()).is_retryable());
    }

    #[tokio::test]
    async fn unreachable_server_is_reported_not_hung() {
        let service = HttpSearchService::new(ServiceClientConfig {
            // Port 9 (discard) on localhost is closed in test environments.
            base_url: "http://127.0.0.1:9/".into(),
            request_timeout: Duration::from_millis(500),
        })
        .unwrap();
        let err = service.fetch_archives().await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Unavailable(_) | ServiceError::Timeout(_)
        ));
        assert!(err.is_retryable());
    }
    /// Serve one canned HTTP response on a local port; the request text is
    /// sent back through the returned handle.
    fn serve_once(body: &'static str) -> (String, std::thread::JoinHandle<String>) {
        use std::io::{Read, Write};

        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/", listener.local_addr().unwrap());
        let handle = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            loop {
                let n = stream.read(&mut buf).unwrap();
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request);
                if let Some(head_end) = text.find("\r\n\r\n") {
                    let length = text[..head_end]
                        .lines()
                        .find_map(|l| {
                            let (name, value) = l.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if request.len() >= head_end + 4 + length {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }
            write!(
                stream,
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            )
            .unwrap();
            String::from_utf8_lossy(&request).to_string()
        });
        (url, handle)
    }

    #[tokio::test]
    async fn archive_list_is_fetched_with_sentinel_body() {
        let (url, server) = serve_once(r#"[{"name":"demo","icon":"demo.webp"}]"#);
        let service = HttpSearchService::new(ServiceClientConfig {
            base_url: url,
            request_timeout: Duration::from_secs(5),
        })
        .unwrap();

        let list = service.fetch_archives().await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].name, "demo");
        assert_eq!(list[0].icon, "demo.webp");

        let request = server.join().unwrap();
        assert!(request.starts_with("POST / "));
        assert!(request.ends_with(ARCHIVE_LIST_REQUEST));
    }

    #[tokio::test]
    async fn malformed_archive_list_is_a_decode_error() {
        let (url, server) = serve_once(r#"{"name":"demo"}"#);
        let service = HttpSearchService::new(ServiceClientConfig {
            base_url: url,
            request_timeout: Duration::from_secs(5),
        })
        .unwrap();

        let err = service.fetch_archives().await.unwrap_err();
        assert!(matches!(err, ServiceError::Decode(_)));
        server.join().unwrap();
    }
}

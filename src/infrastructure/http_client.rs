//! HTTP client for product page fetching
//!
//! One shared `reqwest::Client` per process: browser user agent, cookie
//! store, gzip, and a fixed per-request timeout. Requests are issued one at a
//! time by the caller; there is no rate limiter and no retry here, retries
//! happen as whole passes in the retry coordinator.

use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::infrastructure::config::HttpConfig;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("network error for {url}: {message}")]
    Network { url: String, message: String },

    #[error("HTTP status {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("failed to read body of {url}: {message}")]
    Body { url: String, message: String },
}

/// Source of product page HTML.
///
/// Implemented by [`HttpClient`]; tests substitute an in-memory fake.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_page(&self, url: &str) -> Result<String, FetchError>;
}

#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    timeout: Duration,
}

impl HttpClient {
    /// Create a new HTTP client with custom configuration
    pub fn with_config(config: &HttpConfig) -> anyhow::Result<Self> {
        let client = ClientBuilder::new()
            .timeout(config.timeout())
            .user_agent(&config.user_agent)
            .cookie_store(true)
            .gzip(true)
            .redirect(if config.follow_redirects {
                reqwest::redirect::Policy::limited(10)
            } else {
                reqwest::redirect::Policy::none()
            })
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {e}"))?;

        Ok(Self { client, timeout: config.timeout() })
    }

    fn classify(url: &str, error: &reqwest::Error) -> FetchError {
        if error.is_timeout() {
            FetchError::Timeout { url: url.to_string() }
        } else if let Some(status) = error.status() {
            FetchError::HttpStatus { url: url.to_string(), status: status.as_u16() }
        } else {
            FetchError::Network { url: url.to_string(), message: error.to_string() }
        }
    }
}

#[async_trait]
impl PageFetcher for HttpClient {
    async fn fetch_page(&self, url: &str) -> Result<String, FetchError> {
        debug!("HTTP GET {} (timeout {:?})", url, self.timeout);

        let response = self.client.get(url).send().await.map_err(|e| Self::classify(url, &e))?;

        let status = response.status();
        if !status.is_success() {
            warn!("HTTP error {} for {}", status, url);
            return Err(FetchError::HttpStatus { url: url.to_string(), status: status.as_u16() });
        }

        response.text().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout { url: url.to_string() }
            } else {
                FetchError::Body { url: url.to_string(), message: e.to_string() }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve `response` to a single connection on a local port.
    ///
    /// `None` accepts the connection and never answers.
    async fn serve_once(response: Option<&'static str>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0_u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    return;
                }
                request.extend_from_slice(&buf[..n]);
            }
            match response {
                Some(response) => {
                    socket.write_all(response.as_bytes()).await.unwrap();
                    socket.shutdown().await.ok();
                }
                None => tokio::time::sleep(Duration::from_secs(5)).await,
            }
        });

        format!("http://{addr}/fr/zid123")
    }

    fn client(timeout_seconds: u64) -> HttpClient {
        HttpClient::with_config(&HttpConfig { timeout_seconds, ..HttpConfig::default() }).unwrap()
    }

    #[tokio::test]
    async fn test_success_status_returns_body() {
        let url = serve_once(Some(
            "HTTP/1.1 200 OK\r\ncontent-type: text/html\r\ncontent-length: 14\r\nconnection: close\r\n\r\n<h1>Robot</h1>",
        ))
        .await;

        let body = client(5).fetch_page(&url).await;

        assert_eq!(body, Ok("<h1>Robot</h1>".to_string()));
    }

    #[tokio::test]
    async fn test_error_status_fails_closed() {
        let url = serve_once(Some(
            "HTTP/1.1 503 Service Unavailable\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
        ))
        .await;

        let result = client(5).fetch_page(&url).await;

        assert_eq!(result, Err(FetchError::HttpStatus { url, status: 503 }));
    }

    #[tokio::test]
    async fn test_silent_server_times_out() {
        let url = serve_once(None).await;

        let result = client(1).fetch_page(&url).await;

        assert_eq!(result, Err(FetchError::Timeout { url }));
    }

    #[tokio::test]
    async fn test_refused_connection_is_a_network_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/zid1", listener.local_addr().unwrap());
        drop(listener);

        let result = client(1).fetch_page(&url).await;

        assert!(matches!(result, Err(FetchError::Network { .. })));
    }

    #[test]
    fn test_client_builds_from_default_config() {
        let client = HttpClient::with_config(&HttpConfig::default());
        assert!(client.is_ok());
    }

    #[test]
    fn test_fetch_error_messages_name_the_url() {
        let error = FetchError::HttpStatus { url: "https://www.sharkclean.nl/zid1".to_string(), status: 503 };
        assert_eq!(error.to_string(), "HTTP status 503 for https://www.sharkclean.nl/zid1");
    }
}

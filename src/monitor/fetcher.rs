use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use tokio::time::timeout;
use tracing::{debug, info};

use super::errors::FetchError;

/// Downloads the raw CRL published at a distribution point.
#[async_trait]
pub trait CrlFetcher: Send + Sync + 'static {
    async fn fetch(&self, distribution_point: &str) -> Result<Vec<u8>, FetchError>;
}

/// Fetches CRLs over HTTP(S) with a per-request timeout.
#[derive(Debug, Clone)]
pub struct HttpCrlFetcher {
    client: Client,
    request_timeout: Duration,
}

impl HttpCrlFetcher {
    pub fn new(request_timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            request_timeout,
        })
    }

    pub fn with_client(client: Client, request_timeout: Duration) -> Self {
        Self {
            client,
            request_timeout,
        }
    }
}

#[async_trait]
impl CrlFetcher for HttpCrlFetcher {
    async fn fetch(&self, distribution_point: &str) -> Result<Vec<u8>, FetchError> {
        info!("Fetching CRL from: {}", distribution_point);

        let url = Url::parse(distribution_point).map_err(|e| FetchError::InvalidUrl {
            url: distribution_point.to_string(),
            reason: e.to_string(),
        })?;

        let request = async {
            let response = self.client.get(url).send().await?;

            let status = response.status();
            if !status.is_success() {
                return Err(FetchError::Status {
                    status,
                    url: distribution_point.to_string(),
                });
            }

            Ok(response.bytes().await?)
        };

        let body = match timeout(self.request_timeout, request).await {
            Ok(result) => result?,
            Err(_) => return Err(FetchError::Timeout),
        };

        if body.is_empty() {
            return Err(FetchError::Empty);
        }

        debug!(
            "Fetched {} bytes from {}",
            body.len(),
            distribution_point
        );
        Ok(body.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves one canned HTTP response and returns the URL to request.
    async fn serve_once(status_line: &'static str, body: &'static [u8]) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).await;

            let head = format!(
                "HTTP/1.1 {status_line}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            socket.write_all(head.as_bytes()).await.unwrap();
            socket.write_all(body).await.unwrap();
            socket.shutdown().await.unwrap();
        });

        format!("http://{addr}/level1k.crl")
    }

    fn local_fetcher(request_timeout: Duration) -> HttpCrlFetcher {
        let client = Client::builder().no_proxy().build().unwrap();
        HttpCrlFetcher::with_client(client, request_timeout)
    }

    #[tokio::test]
    async fn test_fetch_returns_body() {
        let url = serve_once("200 OK", b"\x30\x82\x01\x00").await;
        let fetcher = local_fetcher(Duration::from_secs(5));

        let body = fetcher.fetch(&url).await.unwrap();
        assert_eq!(body, b"\x30\x82\x01\x00");
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let url = serve_once("404 Not Found", b"").await;
        let fetcher = local_fetcher(Duration::from_secs(5));

        let err = fetcher.fetch(&url).await.unwrap_err();
        assert!(matches!(
            err,
            FetchError::Status { status, .. } if status == reqwest::StatusCode::NOT_FOUND
        ));
    }

    #[tokio::test]
    async fn test_empty_body_is_rejected() {
        let url = serve_once("200 OK", b"").await;
        let fetcher = local_fetcher(Duration::from_secs(5));

        assert!(matches!(fetcher.fetch(&url).await, Err(FetchError::Empty)));
    }

    #[tokio::test]
    async fn test_slow_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let fetcher = local_fetcher(Duration::from_millis(100));
        let err = fetcher
            .fetch(&format!("http://{addr}/level1k.crl"))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Timeout));
    }

    #[tokio::test]
    async fn test_invalid_url_is_rejected_before_any_request() {
        let fetcher = HttpCrlFetcher::new(Duration::from_secs(1)).unwrap();

        let err = fetcher.fetch("not a url").await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl { .. }));
    }
}

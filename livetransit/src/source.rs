//! Snapshot sources.
//!
//! The poller reads the live vehicle population through [`SnapshotSource`].
//! The production implementation is [`HttpSnapshotSource`], a thin layer over
//! an [`AsyncHttpClient`] so the HTTP transport can be swapped for a mock in
//! tests.

use std::future::Future;
use std::time::Duration;

use crate::error::SourceError;
use crate::snapshot::{decode_snapshot, VehicleSnapshot};

/// Default live feed endpoint.
pub const DEFAULT_API_URL: &str = "https://metro.etfnordic.workers.dev";

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Async HTTP GET, abstracted for dependency injection.
pub trait AsyncHttpClient: Send + Sync {
    /// Performs an HTTP GET request and returns the body.
    fn get(&self, url: &str) -> impl Future<Output = Result<Vec<u8>, SourceError>> + Send;
}

/// Real HTTP client implementation using reqwest.
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    /// Creates a client with the given request timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SourceError::Client(e.to_string()))?;

        Ok(Self { client })
    }

    /// Creates a client with the default timeout.
    pub fn new() -> Result<Self, SourceError> {
        Self::with_timeout(DEFAULT_REQUEST_TIMEOUT)
    }
}

impl AsyncHttpClient for ReqwestHttpClient {
    async fn get(&self, url: &str) -> Result<Vec<u8>, SourceError> {
        let response = self
            .client
            .get(url)
            // Never serve a stale vehicle list from an intermediate cache
            .header(reqwest::header::CACHE_CONTROL, "no-cache")
            .send()
            .await
            .map_err(|e| SourceError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| SourceError::Transport(format!("Failed to read response: {}", e)))
    }
}

/// A periodic read of the live vehicle population.
pub trait SnapshotSource: Send + Sync {
    /// Fetch the current snapshot. Malformed records are already dropped.
    fn fetch(&self) -> impl Future<Output = Result<Vec<VehicleSnapshot>, SourceError>> + Send;

    /// Short name for logs.
    fn name(&self) -> &str;
}

/// Snapshot source backed by an HTTP endpoint returning a JSON array.
pub struct HttpSnapshotSource<C: AsyncHttpClient> {
    url: String,
    http_client: C,
}

impl<C: AsyncHttpClient> HttpSnapshotSource<C> {
    pub fn new(url: impl Into<String>, http_client: C) -> Self {
        Self {
            url: url.into(),
            http_client,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl HttpSnapshotSource<ReqwestHttpClient> {
    /// Source using reqwest with the given timeout.
    pub fn reqwest(url: impl Into<String>, timeout: Duration) -> Result<Self, SourceError> {
        Ok(Self::new(url, ReqwestHttpClient::with_timeout(timeout)?))
    }
}

impl<C: AsyncHttpClient> SnapshotSource for HttpSnapshotSource<C> {
    async fn fetch(&self) -> Result<Vec<VehicleSnapshot>, SourceError> {
        let body = self.http_client.get(&self.url).await?;
        decode_snapshot(&body)
    }

    fn name(&self) -> &str {
        "http"
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Mock HTTP client for testing
    pub struct MockAsyncHttpClient {
        pub response: Result<Vec<u8>, u16>,
        pub calls: AtomicUsize,
    }

    impl MockAsyncHttpClient {
        pub fn ok(body: &str) -> Self {
            Self {
                response: Ok(body.as_bytes().to_vec()),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn status(status: u16) -> Self {
            Self {
                response: Err(status),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl AsyncHttpClient for MockAsyncHttpClient {
        async fn get(&self, url: &str) -> Result<Vec<u8>, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.response {
                Ok(body) => Ok(body.clone()),
                Err(status) => Err(SourceError::Status {
                    status: *status,
                    url: url.to_string(),
                }),
            }
        }
    }

    #[tokio::test]
    async fn test_http_source_decodes_body() {
        let client = MockAsyncHttpClient::ok(r#"[{"id": "A", "lat": 59.33, "lon": 18.06}]"#);
        let source = HttpSnapshotSource::new("http://feed.test", client);

        let records = source.fetch().await.unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "A");
        assert_eq!(source.http_client.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_http_source_propagates_status() {
        let source = HttpSnapshotSource::new("http://feed.test", MockAsyncHttpClient::status(502));

        let err = source.fetch().await.unwrap_err();
        assert_eq!(err.to_string(), "HTTP 502 from http://feed.test");
    }

    #[tokio::test]
    async fn test_http_source_rejects_non_array() {
        let source =
            HttpSnapshotSource::new("http://feed.test", MockAsyncHttpClient::ok("<html>"));
        assert!(matches!(
            source.fetch().await,
            Err(SourceError::Decode(_))
        ));
    }

    #[test]
    fn test_reqwest_client_builds() {
        assert!(ReqwestHttpClient::new().is_ok());
    }
}

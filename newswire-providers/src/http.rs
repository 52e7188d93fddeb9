//! HTTP fetch client
//!
//! Single entry point for outbound provider calls. Applies timeouts, maps
//! HTTP failures onto [`NewsError`], decodes JSON payloads and offers a
//! bounded retry variant with exponential backoff.

use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use crate::error::NewsError;

/// Longest raw-body sample logged on decode failures (debug builds only)
const DECODE_SAMPLE_CHARS: usize = 512;

/// Timeouts and identification for the underlying HTTP client
#[derive(Debug, Clone)]
pub struct FetchClientConfig {
    /// Deadline for establishing a connection
    pub request_timeout: Duration,
    /// Deadline for the whole request, body included
    pub resource_timeout: Duration,
    pub user_agent: String,
}

impl Default for FetchClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            resource_timeout: Duration::from_secs(60),
            user_agent: "Newswire/1.0".to_string(),
        }
    }
}

/// Bounded retry with exponential backoff (base, 2x base, 4x base, ...)
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryConfig {
    /// Delay before retrying after the given (1-based) failed attempt
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

/// A GET request: base URL plus query parameters and headers
#[derive(Debug, Clone, Default)]
pub struct HttpRequest {
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }

    /// Add a query parameter only when a value is present
    pub fn query_opt(self, key: &str, value: Option<impl Into<String>>) -> Self {
        match value {
            Some(value) => self.query(key, value),
            None => self,
        }
    }

    pub fn header(mut self, key: &str, value: impl Into<String>) -> Self {
        self.headers.push((key.to_string(), value.into()));
        self
    }

    /// Resolve the final URL with query parameters applied
    pub fn build_url(&self) -> Result<Url, NewsError> {
        let mut url =
            Url::parse(&self.url).map_err(|e| NewsError::InvalidUrl(format!("{}: {}", self.url, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(NewsError::InvalidUrl(format!(
                "{}: unsupported scheme",
                self.url
            )));
        }
        if !self.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &self.query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }
}

/// Shared HTTP client for every provider adapter
#[derive(Debug, Clone)]
pub struct FetchClient {
    client: Client,
    retry: RetryConfig,
}

impl FetchClient {
    /// Create a client with the given timeouts and retry policy
    pub fn new(config: FetchClientConfig, retry: RetryConfig) -> Self {
        Self {
            client: Client::builder()
                .connect_timeout(config.request_timeout)
                .timeout(config.resource_timeout)
                .user_agent(config.user_agent)
                .build()
                .unwrap_or_else(|_| Client::new()),
            retry,
        }
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// Fetch and decode a JSON payload
    pub async fn fetch_json<T: DeserializeOwned>(&self, request: &HttpRequest) -> Result<T, NewsError> {
        let body = self.fetch_text(request).await?;
        decode_json(&body)
    }

    /// Fetch the raw body (feeds, HTML)
    pub async fn fetch_bytes(&self, request: &HttpRequest) -> Result<Vec<u8>, NewsError> {
        let response = self.send(request).await?;
        let bytes = response.bytes().await.map_err(NewsError::from)?;
        Ok(bytes.to_vec())
    }

    /// [`fetch_json`](Self::fetch_json) with bounded retries on 5xx and transport failures.
    /// 4xx responses and decode failures are returned immediately.
    pub async fn fetch_json_with_retry<T: DeserializeOwned>(
        &self,
        request: &HttpRequest,
    ) -> Result<T, NewsError> {
        self.with_retry(|| self.fetch_json(request)).await
    }

    /// [`fetch_bytes`](Self::fetch_bytes) with bounded retries
    pub async fn fetch_bytes_with_retry(&self, request: &HttpRequest) -> Result<Vec<u8>, NewsError> {
        self.with_retry(|| self.fetch_bytes(request)).await
    }

    async fn fetch_text(&self, request: &HttpRequest) -> Result<String, NewsError> {
        let response = self.send(request).await?;
        response.text().await.map_err(NewsError::from)
    }

    async fn send(&self, request: &HttpRequest) -> Result<reqwest::Response, NewsError> {
        let url = request.build_url()?;
        debug!("GET {}{}", url.host_str().unwrap_or_default(), url.path());

        let mut builder = self.client.get(url);
        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }

        let response = builder.send().await.map_err(NewsError::from)?;
        let status = response.status();
        if !status.is_success() {
            return Err(NewsError::ServerError {
                status: status.as_u16(),
            });
        }
        Ok(response)
    }

    async fn with_retry<T, F, Fut>(&self, mut operation: F) -> Result<T, NewsError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, NewsError>>,
    {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let delay = self.retry.delay_after(attempt);
                    warn!(
                        "Attempt {}/{} failed: {}. Retrying in {:?}",
                        attempt, max_attempts, e, delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl Default for FetchClient {
    fn default() -> Self {
        Self::new(FetchClientConfig::default(), RetryConfig::default())
    }
}

fn decode_json<T: DeserializeOwned>(body: &str) -> Result<T, NewsError> {
    serde_json::from_str(body).map_err(|e| {
        if cfg!(debug_assertions) {
            let sample: String = body.chars().take(DECODE_SAMPLE_CHARS).collect();
            debug!("Failed to decode payload: {}. Body sample: {}", e, sample);
        }
        NewsError::Decoding(e.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Debug, Deserialize, PartialEq)]
    struct Payload {
        status: String,
    }

    fn fast_client() -> FetchClient {
        FetchClient::new(
            FetchClientConfig::default(),
            RetryConfig {
                max_attempts: 3,
                base_delay: Duration::from_millis(1),
            },
        )
    }

    #[test]
    fn test_backoff_doubles() {
        let retry = RetryConfig::default();
        assert_eq!(retry.delay_after(1), Duration::from_secs(1));
        assert_eq!(retry.delay_after(2), Duration::from_secs(2));
        assert_eq!(retry.delay_after(3), Duration::from_secs(4));
    }

    #[test]
    fn test_build_url_appends_query() {
        let url = HttpRequest::get("https://newsapi.org/v2/top-headlines")
            .query("country", "it")
            .query_opt("q", None::<String>)
            .query("q2", "a b")
            .build_url()
            .unwrap();
        assert_eq!(url.as_str(), "https://newsapi.org/v2/top-headlines?country=it&q2=a+b");
    }

    #[test]
    fn test_invalid_url_rejected() {
        let err = HttpRequest::get("not a url").build_url().unwrap_err();
        assert!(matches!(err, NewsError::InvalidUrl(_)));

        let err = HttpRequest::get("ftp://example.com/feed").build_url().unwrap_err();
        assert!(matches!(err, NewsError::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn test_fetch_json_success() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/news"))
            .and(query_param("apiKey", "k1"))
            .and(header("X-Test", "yes"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"status":"ok"}"#))
            .mount(&mock_server)
            .await;

        let request = HttpRequest::get(format!("{}/news", mock_server.uri()))
            .query("apiKey", "k1")
            .header("X-Test", "yes");
        let payload: Payload = fast_client().fetch_json(&request).await.unwrap();
        assert_eq!(payload.status, "ok");
    }

    #[tokio::test]
    async fn test_non_success_status_maps_to_server_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&mock_server)
            .await;

        let request = HttpRequest::get(mock_server.uri());
        let err = fast_client().fetch_json::<Payload>(&request).await.unwrap_err();
        assert_eq!(err, NewsError::ServerError { status: 429 });
    }

    #[tokio::test]
    async fn test_bad_payload_maps_to_decoding_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&mock_server)
            .await;

        let request = HttpRequest::get(mock_server.uri());
        let err = fast_client().fetch_json::<Payload>(&request).await.unwrap_err();
        assert!(matches!(err, NewsError::Decoding(_)));
    }

    #[tokio::test]
    async fn test_retry_recovers_from_server_errors() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .expect(2)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"status":"ok"}"#))
            .expect(1)
            .mount(&mock_server)
            .await;

        let request = HttpRequest::get(mock_server.uri());
        let payload: Payload = fast_client().fetch_json_with_retry(&request).await.unwrap();
        assert_eq!(payload, Payload { status: "ok".into() });
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max_attempts() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&mock_server)
            .await;

        let request = HttpRequest::get(mock_server.uri());
        let err = fast_client()
            .fetch_bytes_with_retry(&request)
            .await
            .unwrap_err();
        assert_eq!(err, NewsError::ServerError { status: 500 });
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&mock_server)
            .await;

        let request = HttpRequest::get(mock_server.uri());
        let err = fast_client()
            .fetch_json_with_retry::<Payload>(&request)
            .await
            .unwrap_err();
        assert_eq!(err, NewsError::ServerError { status: 404 });
    }
}

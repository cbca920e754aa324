//! HTTP transport over reqwest.

use std::time::Duration;

use tracing::debug;

use crate::types::Method;

use super::{ApiRequest, ApiResponse, Transport, TransportError, TransportFuture, TransportResult};

/// Connection settings for [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Origin the API paths are resolved against.
    pub base_url: String,
    /// Per-request timeout in milliseconds.
    pub request_timeout_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            request_timeout_ms: 10_000,
        }
    }
}

/// [`Transport`] that talks JSON over HTTP.
pub struct HttpTransport {
    base_url: String,
    client: reqwest::Client,
}

impl HttpTransport {
    /// Builds a client from `config`.
    pub fn new(config: HttpConfig) -> TransportResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| TransportError::Network(format!("client build failed: {e}")))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Absolute URL for an API path.
    pub fn url_for(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!("{}{}", self.base_url, path)
    }

    async fn execute(&self, request: ApiRequest) -> TransportResult<ApiResponse> {
        let url = self.url_for(&request.url);
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self.client.request(method, &url);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        let bytes = response.bytes().await.map_err(map_reqwest_error)?;
        debug!(method = %request.method, %url, status, "api call");

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(ApiResponse::empty(status));
        }

        match serde_json::from_slice(&bytes) {
            Ok(body) => Ok(ApiResponse::json(status, body)),
            // Error pages are often HTML; the status already tells the story.
            Err(_) if !(200..300).contains(&status) => Ok(ApiResponse::empty(status)),
            Err(e) => Err(TransportError::Decode(e.to_string())),
        }
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: ApiRequest) -> TransportFuture<'_> {
        Box::pin(self.execute(request))
    }
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Network(err.to_string())
    }
}

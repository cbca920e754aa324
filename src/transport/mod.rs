//! Remote API seam used by the sync engine and the request wrapper.
//!
//! The sync core never speaks HTTP directly; it hands an [`ApiRequest`] to a
//! [`Transport`]. [`http::HttpTransport`] is the production implementation,
//! tests script their own.

/// reqwest-backed transport.
pub mod http;

use std::{future::Future, pin::Pin};

use serde_json::Value;

use crate::types::Method;

/// One call against the remote API.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    /// HTTP verb.
    pub method: Method,
    /// Path plus query, e.g. `/api/daily-habits?date=2024-01-10`.
    pub url: String,
    /// JSON body, if any.
    pub body: Option<Value>,
}

impl ApiRequest {
    /// `GET url`.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            body: None,
        }
    }

    /// `POST url` with a JSON body.
    pub fn post(url: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            body: Some(body),
        }
    }

    /// `DELETE url`.
    pub fn delete(url: impl Into<String>) -> Self {
        Self {
            method: Method::Delete,
            url: url.into(),
            body: None,
        }
    }
}

/// Status and decoded body of a completed call.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    /// HTTP status code.
    pub status: u16,
    /// Decoded JSON body; `None` when the body was empty.
    pub body: Option<Value>,
}

impl ApiResponse {
    /// Response with a JSON body.
    pub fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            body: Some(body),
        }
    }

    /// Response without a body.
    pub fn empty(status: u16) -> Self {
        Self { status, body: None }
    }

    /// True for 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Error type for transport operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The request never got a response (offline, DNS, refused).
    #[error("network error: {0}")]
    Network(String),

    /// No response within the configured timeout.
    #[error("request timed out")]
    Timeout,

    /// The response body was not valid JSON.
    #[error("response decode failed: {0}")]
    Decode(String),
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Boxed future returned by [`Transport::send`].
pub type TransportFuture<'a> =
    Pin<Box<dyn Future<Output = TransportResult<ApiResponse>> + Send + 'a>>;

/// Issues calls against the remote API.
///
/// A non-2xx status is a successful transport call; callers decide what a
/// negative status means.
pub trait Transport: Send + Sync {
    /// Sends one request and waits for its response.
    fn send(&self, request: ApiRequest) -> TransportFuture<'_>;
}

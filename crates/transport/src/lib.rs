//! HTTP transport capability
//!
//! Defines the `Transport` trait that decouples the credential engine from
//! the HTTP stack. The engine only ever sees `send(request) -> response or
//! transport error`; `HttpTransport` is the reqwest-backed default, and tests
//! substitute scripted implementations.
//!
//! Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility
//! (`Arc<dyn Transport>`).

pub mod http;

pub use http::HttpTransport;

use std::future::Future;
use std::pin::Pin;

/// HTTP method for an outbound exchange.
///
/// Only the verbs the identity provider's API actually uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    /// Wire name of the verb.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One outbound HTTP exchange, fully described.
///
/// Headers are plain string pairs so stub transports can inspect them
/// without pulling in an HTTP type stack.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl TransportRequest {
    /// Build a GET request with no headers or body.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Build a POST request with the given body.
    pub fn post(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            headers: Vec::new(),
            body: Some(body.into()),
        }
    }

    /// Append a header pair.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Value of the first header with the given name, if any.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Status and body of a completed exchange.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Transport-level failures: the exchange never produced a response.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("transport failure: {0}")]
    Network(String),
}

/// Classification of an API response status for the credential lifecycle.
///
/// `InvalidCredential` is the one class the orchestrator acts on (queue and
/// refresh); everything else is handed back to the caller untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseClass {
    /// 2xx
    Success,
    /// The provider rejected the bearer credential (expired or invalid)
    InvalidCredential,
    /// Any other failure status, surfaced to the caller as-is
    Failed,
}

/// Classify a response status.
///
/// 401 is the provider's distinguishable invalid/expired-credential signal.
/// 403 is deliberately NOT mapped to `InvalidCredential`: it means the
/// credential is valid but lacks permission, and refreshing would loop.
pub fn classify_status(status: u16) -> ResponseClass {
    match status {
        200..=299 => ResponseClass::Success,
        401 => ResponseClass::InvalidCredential,
        _ => ResponseClass::Failed,
    }
}

/// Abstraction over the HTTP stack.
///
/// The engine invokes `send` without holding any internal lock, so a slow
/// exchange never blocks unrelated state transitions.
pub trait Transport: Send + Sync {
    fn send(
        &self,
        request: TransportRequest,
    ) -> Pin<Box<dyn Future<Output = Result<TransportResponse, TransportError>> + Send + '_>>;
}

//! reqwest-backed transport
//!
//! The default `Transport` implementation. Connection pooling and TLS come
//! from the shared `reqwest::Client`; the per-request timeout is fixed at
//! construction so every exchange the engine performs is bounded.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tracing::debug;

use crate::{Method, Transport, TransportError, TransportRequest, TransportResponse};

/// HTTP transport over a shared `reqwest::Client`.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Build a transport with the given per-request timeout.
    ///
    /// Returns an error only if the TLS backend cannot be initialized.
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Network(format!("building http client: {e}")))?;
        Ok(Self { client })
    }

    /// Wrap an existing `reqwest::Client` (shared with the embedding app).
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Transport for HttpTransport {
    fn send(
        &self,
        request: TransportRequest,
    ) -> Pin<Box<dyn Future<Output = Result<TransportResponse, TransportError>> + Send + '_>> {
        Box::pin(async move {
            let method = match request.method {
                Method::Get => reqwest::Method::GET,
                Method::Post => reqwest::Method::POST,
            };

            let mut builder = self.client.request(method, &request.url);
            for (name, value) in &request.headers {
                builder = builder.header(name, value);
            }
            if let Some(body) = request.body {
                builder = builder.body(body);
            }

            let response = builder.send().await.map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout
                } else {
                    TransportError::Network(e.to_string())
                }
            })?;

            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .map_err(|e| TransportError::Network(format!("reading response body: {e}")))?;

            debug!(
                method = request.method.as_str(),
                url = %request.url,
                status,
                "exchange completed"
            );

            Ok(TransportResponse { status, body })
        })
    }
}

//! API call descriptors

use uuid::Uuid;

pub use transport::Method;

/// One outbound authenticated API call.
///
/// `attempt` counts transport sends performed for this request; the
/// orchestrator increments it on every (re)send and enforces the configured
/// cap. The id exists for log correlation only.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub id: Uuid,
    pub method: Method,
    /// Path below `/api/{version}/`, e.g. `me` or `user/42/logins`.
    pub path: String,
    pub body: Option<serde_json::Value>,
    pub(crate) attempt: u32,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>, body: Option<serde_json::Value>) -> Self {
        Self {
            id: Uuid::new_v4(),
            method,
            path: path.into(),
            body,
            attempt: 0,
        }
    }

    /// GET request for an API path.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path, None)
    }

    /// POST request with a JSON body.
    pub fn post(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self::new(Method::Post, path, Some(body))
    }

    /// Transport sends performed so far.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

/// Response handed back to the caller.
///
/// Any status the provider returned, except the invalid-credential signal
/// the orchestrator consumed, ends up here untouched.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parse the body as JSON.
    pub fn json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::from_str(&self.body)
    }
}

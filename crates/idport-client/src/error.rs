//! Error types for orchestrated API calls and interactive flows

use idport_auth::TokenError;

/// Terminal outcomes for an orchestrated API call.
///
/// Cloneable because one refresh failure fans out to every parked call.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ApiError {
    #[error("network failure: {0}")]
    Network(String),

    #[error("no usable credential; interactive authorization required")]
    Unauthorized,

    #[error("retry limit exceeded after {attempts} attempts")]
    RetryLimitExceeded { attempts: u32 },

    #[error("pending request queue is full")]
    QueueFull,

    #[error("provider returned a malformed response: {0}")]
    MalformedResponse(String),

    #[error("request was dropped before completion")]
    Dropped,
}

/// Result alias for orchestrated calls.
pub type Result<T> = std::result::Result<T, ApiError>;

/// Outcomes of an interactive authorization or logout flow.
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error("an interactive flow is already in progress")]
    AlreadyInProgress,

    #[error("flow cancelled by the user")]
    Cancelled,

    #[error("provider declined authorization: {0}")]
    Denied(String),

    #[error("callback state mismatch")]
    StateMismatch,

    #[error("unexpected callback: {0}")]
    UnexpectedCallback(String),

    #[error("invalid client configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Token(#[from] TokenError),
}

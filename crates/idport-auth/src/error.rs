//! Error types for authentication operations

/// Errors from token-endpoint grants.
///
/// The three classes drive different recoveries: `Network` is retryable,
/// `InvalidGrant` forces full re-authorization and clears stored state,
/// `MalformedResponse` is an integration defect to surface.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TokenError {
    #[error("token endpoint unreachable: {0}")]
    Network(String),

    #[error("grant rejected by provider: {0}")]
    InvalidGrant(String),

    #[error("malformed token response: {0}")]
    MalformedResponse(String),
}

/// Result alias for token operations.
pub type Result<T> = std::result::Result<T, TokenError>;

/// Errors from credential persistence.
///
/// Load failures are NOT represented here: a missing or corrupt record
/// loads as absent.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("credential store I/O: {0}")]
    Io(String),
}

/// Errors from building or parsing authorization/callback URLs.
#[derive(Debug, thiserror::Error)]
pub enum UrlError {
    #[error("malformed URL: {0}")]
    Malformed(String),

    #[error("callback not addressed to this client: {0}")]
    ForeignCallback(String),
}

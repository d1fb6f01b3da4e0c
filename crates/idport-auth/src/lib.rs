//! Identity-provider authentication library
//!
//! Provides the credential entity, token-endpoint grants, authorization and
//! callback URL handling, PKCE/state generation, and credential persistence
//! for the idport client. This crate is a standalone library with no
//! dependency on the orchestration layer — it can be tested and used
//! independently.
//!
//! Credential flow:
//! 1. The app generates `pkce::generate_verifier()` + `pkce::compute_challenge()`
//!    and a CSRF `pkce::generate_state()`
//! 2. The user authorizes via `authorize::authorization_request_url()`
//! 3. The redirect is routed with `callback::parse_callback()`
//! 4. The code is exchanged via `TokenEndpointClient::exchange_code()`
//! 5. The credential is persisted via `SecureStore::save()`
//! 6. Later calls renew it via `TokenEndpointClient::refresh()`

pub mod authorize;
pub mod callback;
pub mod config;
pub mod credential;
pub mod error;
pub mod pkce;
pub mod store;
pub mod token;

pub use callback::{Callback, CallbackRoute};
pub use config::ClientConfig;
pub use credential::{Credential, unix_millis_now};
pub use error::{Result, StoreError, TokenError, UrlError};
pub use pkce::{compute_challenge, generate_state, generate_verifier};
pub use store::{FileCredentialStore, MemoryCredentialStore, SecureStore};
pub use token::{TokenEndpointClient, TokenResponse};

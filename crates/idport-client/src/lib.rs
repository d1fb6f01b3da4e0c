//! Credential lifecycle and request orchestration
//!
//! Owns the current credential, a bounded queue of pending API calls, and
//! the refresh state machine. Every authenticated call goes through
//! `RequestOrchestrator`, which decides per call whether to send it
//! immediately, park it and renew the credential, or fail it. The
//! interactive side (browser-redirect authorization, logout) lives in
//! `AuthorizationFlow`, behind the `UserAgent` capability.
//!
//! Request lifecycle:
//! 1. Caller submits via `RequestOrchestrator::execute()` (or `get`/`post`)
//! 2. A usable credential → the call is sent with a bearer header
//! 3. Provider rejects the credential → the call is parked and exactly one
//!    refresh starts
//! 4. Refresh success → the queue drains in submission order, each resend
//!    attempt-capped
//! 5. Refresh rejection → stored state is cleared and parked calls fail
//!    `Unauthorized`
//! 6. Every call resolves exactly once, with a response or a terminal error

pub mod error;
pub mod flow;
pub mod metrics;
pub mod orchestrator;
pub mod request;

pub use error::{ApiError, FlowError, Result};
pub use flow::{AuthorizationFlow, BrowserResult, UserAgent};
pub use orchestrator::RequestOrchestrator;
pub use request::{ApiRequest, ApiResponse};

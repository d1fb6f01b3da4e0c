//! Interactive authorization and logout flows
//!
//! Drives the browser-redirect step through the `UserAgent` capability: the
//! core hands it a URL, the capability eventually reports back the callback
//! URL the provider redirected to (or that the user gave up). How the page
//! is rendered — embedded web view, system browser, test stub — is entirely
//! the capability's business.
//!
//! Exactly one interactive flow may run at a time. A second concurrent start
//! is rejected with `AlreadyInProgress` rather than silently coalesced: two
//! concurrent browser sessions would corrupt provider-side login state.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use idport_auth::callback::{self, CallbackRoute};
use idport_auth::{Credential, authorize, pkce};
use tracing::{debug, info, warn};

use crate::error::FlowError;
use crate::orchestrator::RequestOrchestrator;

/// What the interactive step produced.
#[derive(Debug, Clone)]
pub enum BrowserResult {
    /// The provider redirected to the given callback URL.
    Redirect(String),
    /// The user dismissed the interactive step.
    Cancelled,
}

/// The opaque web-view/browser capability.
///
/// `present` resolves exactly once per invocation. It is bounded only by
/// user action: cancellation must be reported as `Cancelled`, never by
/// leaving the future pending forever.
pub trait UserAgent: Send + Sync {
    fn present(&self, url: &str) -> Pin<Box<dyn Future<Output = BrowserResult> + Send + '_>>;
}

/// The interactive pages the provider hosts.
#[derive(Debug, Clone, Copy)]
enum InteractivePage {
    Login,
    Registration,
    LostPassword,
}

impl InteractivePage {
    fn label(&self) -> &'static str {
        match self {
            InteractivePage::Login => "login",
            InteractivePage::Registration => "registration",
            InteractivePage::LostPassword => "lost_password",
        }
    }
}

/// Coordinates interactive authorization against the provider.
pub struct AuthorizationFlow {
    orchestrator: RequestOrchestrator,
    user_agent: Arc<dyn UserAgent>,
    in_flight: AtomicBool,
}

/// Releases the in-flight guard on every exit path, including cancellation.
struct FlowGuard<'a>(&'a AtomicBool);

impl Drop for FlowGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl AuthorizationFlow {
    pub fn new(orchestrator: RequestOrchestrator, user_agent: Arc<dyn UserAgent>) -> Self {
        Self {
            orchestrator,
            user_agent,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Run the browser-redirect authorization and install the resulting
    /// credential.
    pub async fn start_authorization(&self) -> Result<Credential, FlowError> {
        let _guard = self.acquire_guard()?;
        self.run_interactive(InteractivePage::Login).await
    }

    /// Interactive account registration; completes like a login.
    pub async fn start_registration(&self) -> Result<Credential, FlowError> {
        let _guard = self.acquire_guard()?;
        self.run_interactive(InteractivePage::Registration).await
    }

    /// Interactive password recovery; completes like a login.
    pub async fn start_lost_password(&self) -> Result<Credential, FlowError> {
        let _guard = self.acquire_guard()?;
        self.run_interactive(InteractivePage::LostPassword).await
    }

    /// Provider-side logout via the browser.
    ///
    /// The remote step is best-effort: whatever the browser reports, the
    /// local credential is cleared and the stored record deleted.
    pub async fn logout(&self) -> Result<(), FlowError> {
        let _guard = self.acquire_guard()?;

        if let Some(credential) = self.orchestrator.current_credential().await {
            match authorize::logout_request_url(self.orchestrator.config(), &credential.access_token)
            {
                Ok(url) => match self.user_agent.present(&url).await {
                    BrowserResult::Redirect(raw) => {
                        match callback::parse_callback(self.orchestrator.config(), &raw) {
                            Ok(cb) if cb.route == CallbackRoute::Logout => {
                                debug!("provider confirmed logout")
                            }
                            Ok(cb) => {
                                warn!(route = ?cb.route, "unexpected callback during logout")
                            }
                            Err(e) => warn!(error = %e, "unparseable logout callback"),
                        }
                    }
                    BrowserResult::Cancelled => {
                        debug!("logout page dismissed, clearing local state anyway")
                    }
                },
                Err(e) => warn!(error = %e, "could not build logout URL"),
            }
        }

        self.orchestrator.clear_credential().await;
        info!("logged out locally");
        Ok(())
    }

    /// Clear local credential state without any provider interaction.
    pub async fn soft_logout(&self) {
        self.orchestrator.clear_credential().await;
        info!("soft logout complete");
    }

    fn acquire_guard(&self) -> Result<FlowGuard<'_>, FlowError> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            Ok(FlowGuard(&self.in_flight))
        } else {
            Err(FlowError::AlreadyInProgress)
        }
    }

    async fn run_interactive(&self, page: InteractivePage) -> Result<Credential, FlowError> {
        let config = self.orchestrator.config();
        let verifier = pkce::generate_verifier();
        let challenge = pkce::compute_challenge(&verifier);
        let state = pkce::generate_state();

        let url = match page {
            InteractivePage::Login => {
                authorize::authorization_request_url(config, &state, Some(&challenge))
            }
            InteractivePage::Registration => {
                authorize::registration_request_url(config, &state, Some(&challenge))
            }
            InteractivePage::LostPassword => {
                authorize::lost_password_request_url(config, &state, Some(&challenge))
            }
        }
        .map_err(|e| FlowError::Config(e.to_string()))?;

        debug!(page = page.label(), "presenting interactive page");
        let raw = match self.user_agent.present(&url).await {
            BrowserResult::Redirect(raw) => raw,
            BrowserResult::Cancelled => {
                info!(page = page.label(), "interactive flow cancelled by user");
                return Err(FlowError::Cancelled);
            }
        };

        let cb = callback::parse_callback(config, &raw)
            .map_err(|e| FlowError::UnexpectedCallback(e.to_string()))?;

        match cb.route {
            CallbackRoute::Failure => {
                return Err(FlowError::Denied(
                    cb.error.unwrap_or_else(|| "authorization failed".into()),
                ));
            }
            CallbackRoute::Logout => {
                return Err(FlowError::UnexpectedCallback(
                    "logout callback during an authorization flow".into(),
                ));
            }
            CallbackRoute::Login => {}
        }

        if let Some(error) = cb.error {
            return Err(FlowError::Denied(error));
        }
        if cb.state.as_deref() != Some(state.as_str()) {
            warn!("callback state does not match the one this flow issued");
            return Err(FlowError::StateMismatch);
        }
        let code = cb.code.ok_or_else(|| {
            FlowError::UnexpectedCallback("callback carried neither code nor error".into())
        })?;

        let credential = self
            .orchestrator
            .token_client()
            .exchange_code(&code, Some(&verifier))
            .await?;
        self.orchestrator.install_credential(credential.clone()).await;
        info!(
            page = page.label(),
            subject = ?credential.subject_id,
            "authorization complete"
        );
        Ok(credential)
    }
}

//! Request orchestration and the refresh state machine
//!
//! One `tokio::sync::Mutex` guards the engine state: the current credential,
//! the bounded pending queue, and the refreshing flag. Every decision (send,
//! park, renew, fail) is made under that lock; transport and token-endpoint
//! calls always run outside it, and the transition that follows their
//! completion is re-applied atomically. That single boundary is what makes
//! "at most one refresh in flight" and "the queue drains exactly once"
//! checkable by construction.
//!
//! Refresh runs on a spawned task, never on a caller's task, so a caller
//! dropping its future mid-refresh cannot wedge the flag.
//!
//! Credential transitions:
//! - usable → sent immediately with a bearer header
//! - expiring within the leeway, renewable → parked, single refresh starts
//! - rejected by the provider (401), renewable → parked, single refresh starts
//! - rejected or expired, not renewable → cleared, `Unauthorized`
//! - refresh renewed → persisted, queue drained FIFO with attempt caps
//! - refresh rejected → cleared, store deleted, queue fails `Unauthorized`
//! - refresh transient failure → credential kept, queue fails with the error

use std::collections::VecDeque;
use std::sync::Arc;

use idport_auth::{ClientConfig, Credential, SecureStore, TokenEndpointClient, TokenError};
use tokio::sync::{Mutex, oneshot};
use tracing::{debug, info, warn};
use transport::{Method, ResponseClass, Transport, TransportRequest, classify_status};

use crate::error::ApiError;
use crate::metrics;
use crate::request::{ApiRequest, ApiResponse};

type Completion = oneshot::Sender<Result<ApiResponse, ApiError>>;

/// A request together with its pending completion.
struct PendingCall {
    request: ApiRequest,
    completion: Completion,
}

/// Mutable engine state, all behind one lock.
struct EngineState {
    credential: Option<Credential>,
    queue: VecDeque<PendingCall>,
    refreshing: bool,
}

/// What was decided under the lock, applied after releasing it.
enum Decision {
    Send(PendingCall, Credential),
    Refresh(Credential),
    Fail(PendingCall, ApiError),
    /// Rejected credential with no renewal path: terminal, clears the store.
    Terminal(PendingCall),
    Parked,
}

/// Owner of the credential and the pending-request queue.
///
/// Explicitly constructed and injectable; embedders keep one instance per
/// provider/client pair. Cloning is cheap (shared state) — clones observe
/// and drive the same engine.
#[derive(Clone)]
pub struct RequestOrchestrator {
    config: Arc<ClientConfig>,
    transport: Arc<dyn Transport>,
    store: Arc<dyn SecureStore>,
    token_client: Arc<TokenEndpointClient>,
    state: Arc<Mutex<EngineState>>,
}

impl RequestOrchestrator {
    /// Build an orchestrator, restoring any persisted credential.
    pub async fn new(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        store: Arc<dyn SecureStore>,
    ) -> Self {
        let config = Arc::new(config);
        let credential = store.load().await;
        match &credential {
            Some(credential) => {
                info!(
                    subject = ?credential.subject_id,
                    expired = credential.is_expired(),
                    "restored stored credential"
                );
            }
            None => debug!("no stored credential, starting unauthorized"),
        }
        Self {
            token_client: Arc::new(TokenEndpointClient::new(config.clone(), transport.clone())),
            config,
            transport,
            store,
            state: Arc::new(Mutex::new(EngineState {
                credential,
                queue: VecDeque::new(),
                refreshing: false,
            })),
        }
    }

    pub fn config(&self) -> &Arc<ClientConfig> {
        &self.config
    }

    pub(crate) fn token_client(&self) -> &TokenEndpointClient {
        &self.token_client
    }

    /// GET an API path.
    pub async fn get(&self, path: &str) -> Result<ApiResponse, ApiError> {
        self.execute(ApiRequest::get(path)).await
    }

    /// POST a JSON body to an API path.
    pub async fn post(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<ApiResponse, ApiError> {
        self.execute(ApiRequest::post(path, body)).await
    }

    /// Run one API call through the credential lifecycle.
    ///
    /// Resolves exactly once: with the provider's response, or with a
    /// terminal error after the bounded retry/refresh sequence.
    pub async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let (completion, receiver) = oneshot::channel();
        self.submit(PendingCall {
            request,
            completion,
        })
        .await;
        receiver.await.unwrap_or(Err(ApiError::Dropped))
    }

    /// Replace the credential and persist it.
    ///
    /// Store failures are logged, not fatal: the in-memory transition wins.
    pub async fn install_credential(&self, credential: Credential) {
        {
            let mut state = self.state.lock().await;
            state.credential = Some(credential.clone());
        }
        if let Err(e) = self.store.save(&credential).await {
            warn!(error = %e, "failed to persist credential");
        }
    }

    /// Drop the credential and delete the persisted record.
    pub async fn clear_credential(&self) {
        {
            let mut state = self.state.lock().await;
            state.credential = None;
        }
        if let Err(e) = self.store.delete().await {
            warn!(error = %e, "failed to delete stored credential");
        }
    }

    /// Obtain and install an app-level credential (no user attached).
    pub async fn acquire_client_credential(&self) -> Result<Credential, TokenError> {
        let credential = self.token_client.client_credentials().await?;
        self.install_credential(credential.clone()).await;
        info!("acquired client credential");
        Ok(credential)
    }

    /// Snapshot of the current credential.
    pub async fn current_credential(&self) -> Option<Credential> {
        self.state.lock().await.credential.clone()
    }

    /// Whether a credential is currently held.
    pub async fn is_authorized(&self) -> bool {
        self.state.lock().await.credential.is_some()
    }

    /// Subject of the current credential, if it is a user credential.
    pub async fn current_subject(&self) -> Option<String> {
        self.state
            .lock()
            .await
            .credential
            .as_ref()
            .and_then(|c| c.subject_id.clone())
    }

    /// Expiry instant (unix milliseconds) of the current credential.
    pub async fn token_expires_at(&self) -> Option<u64> {
        self.state
            .lock()
            .await
            .credential
            .as_ref()
            .and_then(|c| c.expires_at)
    }

    /// Whether the current credential is past expiry (true when none held).
    pub async fn has_token_expired(&self) -> bool {
        match &self.state.lock().await.credential {
            Some(credential) => credential.is_expired(),
            None => true,
        }
    }

    /// Decide what to do with a freshly submitted call.
    async fn submit(&self, call: PendingCall) {
        let decision = {
            let mut state = self.state.lock().await;
            if state.refreshing {
                Self::park(&mut state, call, self.config.queue_capacity)
            } else {
                match state.credential.clone() {
                    None => Decision::Fail(call, ApiError::Unauthorized),
                    Some(credential) if credential.usable_for(self.config.expiry_leeway) => {
                        Decision::Send(call, credential)
                    }
                    Some(credential) if credential.can_renew() => {
                        // Imminent expiry: this call triggers the refresh
                        match Self::park(&mut state, call, self.config.queue_capacity) {
                            Decision::Parked => {
                                state.refreshing = true;
                                Decision::Refresh(credential)
                            }
                            rejected => rejected,
                        }
                    }
                    Some(_) => {
                        // Expired with no way to renew: only interactive
                        // authorization can help
                        state.credential = None;
                        Decision::Fail(call, ApiError::Unauthorized)
                    }
                }
            }
        };
        self.act(decision).await;
    }

    /// Decide what to do after the provider rejected the credential a call
    /// was sent with. Returns the call and a fresh credential when the
    /// caller should retry the send itself.
    async fn after_rejection(
        &self,
        call: PendingCall,
        used: &Credential,
    ) -> Option<(PendingCall, Credential)> {
        let decision = {
            let mut state = self.state.lock().await;
            if state.refreshing {
                Self::park(&mut state, call, self.config.queue_capacity)
            } else {
                match state.credential.clone() {
                    Some(current) if current.access_token != used.access_token => {
                        // Renewed while this call was in flight: retry with
                        // the fresh credential, no second refresh
                        Decision::Send(call, current)
                    }
                    Some(current) if current.can_renew() => {
                        match Self::park(&mut state, call, self.config.queue_capacity) {
                            Decision::Parked => {
                                state.refreshing = true;
                                Decision::Refresh(current)
                            }
                            rejected => rejected,
                        }
                    }
                    Some(_) | None => {
                        state.credential = None;
                        Decision::Terminal(call)
                    }
                }
            }
        };
        match decision {
            Decision::Send(call, credential) => Some((call, credential)),
            other => {
                Box::pin(self.act(other)).await;
                None
            }
        }
    }

    /// Apply a decision outside the lock.
    async fn act(&self, decision: Decision) {
        match decision {
            Decision::Send(call, credential) => self.dispatch(call, credential).await,
            Decision::Refresh(seed) => self.spawn_refresh(seed),
            Decision::Fail(call, error) => complete(call, Err(error)),
            Decision::Terminal(call) => {
                complete(call, Err(ApiError::Unauthorized));
                if let Err(e) = self.store.delete().await {
                    warn!(error = %e, "failed to delete stored credential");
                }
            }
            Decision::Parked => {}
        }
    }

    /// Append a call to the pending queue, or reject it when full.
    fn park(state: &mut EngineState, call: PendingCall, capacity: usize) -> Decision {
        if state.queue.len() >= capacity {
            warn!(
                request_id = %call.request.id,
                capacity,
                "pending queue full, rejecting request"
            );
            return Decision::Fail(call, ApiError::QueueFull);
        }
        debug!(
            request_id = %call.request.id,
            queued = state.queue.len() + 1,
            "parked request awaiting credential renewal"
        );
        metrics::record_parked();
        state.queue.push_back(call);
        Decision::Parked
    }

    /// Send a call, looping through bounded credential-rejection retries.
    async fn dispatch(&self, mut call: PendingCall, mut credential: Credential) {
        loop {
            if call.request.attempt >= self.config.max_attempts {
                let attempts = call.request.attempt;
                debug!(request_id = %call.request.id, attempts, "retry limit reached");
                complete(call, Err(ApiError::RetryLimitExceeded { attempts }));
                return;
            }
            call.request.attempt += 1;

            let request = self.build_transport_request(&call.request, &credential);
            debug!(
                request_id = %call.request.id,
                attempt = call.request.attempt,
                method = %call.request.method,
                path = %call.request.path,
                "sending api request"
            );

            match self.transport.send(request).await {
                Err(e) => {
                    complete(call, Err(ApiError::Network(e.to_string())));
                    return;
                }
                Ok(response) => match classify_status(response.status) {
                    ResponseClass::InvalidCredential => {
                        debug!(
                            request_id = %call.request.id,
                            "provider rejected the credential"
                        );
                        match self.after_rejection(call, &credential).await {
                            Some((retry, renewed)) => {
                                call = retry;
                                credential = renewed;
                            }
                            None => return,
                        }
                    }
                    _ => {
                        complete(
                            call,
                            Ok(ApiResponse {
                                status: response.status,
                                body: response.body,
                            }),
                        );
                        return;
                    }
                },
            }
        }
    }

    fn build_transport_request(
        &self,
        request: &ApiRequest,
        credential: &Credential,
    ) -> TransportRequest {
        let url = self.config.api_url(&request.path);
        let transport_request = match request.method {
            Method::Get => TransportRequest::get(url),
            Method::Post => {
                let body = request
                    .body
                    .as_ref()
                    .map(|b| b.to_string())
                    .unwrap_or_default();
                TransportRequest::post(url, body).header("Content-Type", "application/json")
            }
        };
        transport_request.header(
            "Authorization",
            format!("Bearer {}", credential.access_token),
        )
    }

    /// Run the single in-flight refresh on its own task.
    fn spawn_refresh(&self, seed: Credential) {
        info!(
            client_credential = seed.is_client_credential,
            "starting credential renewal"
        );
        let this = self.clone();
        tokio::spawn(async move { this.run_refresh(seed).await });
    }

    async fn run_refresh(&self, seed: Credential) {
        // A client credential has no refresh token by invariant; renewing it
        // means re-running the client-credentials grant.
        let result = if seed.is_client_credential {
            self.token_client.client_credentials().await
        } else {
            self.token_client.refresh(&seed).await
        };

        enum Verdict {
            Renewed(Credential),
            Rejected,
            Failed(ApiError),
        }

        let (drained, verdict) = {
            let mut state = self.state.lock().await;
            state.refreshing = false;
            let drained: Vec<PendingCall> = state.queue.drain(..).collect();
            let verdict = match &result {
                Ok(credential) => {
                    state.credential = Some(credential.clone());
                    Verdict::Renewed(credential.clone())
                }
                Err(TokenError::InvalidGrant(reason)) => {
                    warn!(%reason, "renewal rejected, clearing credential");
                    state.credential = None;
                    Verdict::Rejected
                }
                Err(e) => {
                    // Transient or integration failure: the credential (and
                    // its refresh token) stays; the next submission starts
                    // the next cycle
                    Verdict::Failed(refresh_failure(e))
                }
            };
            (drained, verdict)
        };

        match verdict {
            Verdict::Renewed(credential) => {
                metrics::record_refresh("renewed");
                if let Err(e) = self.store.save(&credential).await {
                    warn!(error = %e, "failed to persist renewed credential");
                }
                info!(resend = drained.len(), "credential renewed, draining queue");
                for call in drained {
                    self.dispatch(call, credential.clone()).await;
                }
            }
            Verdict::Rejected => {
                metrics::record_refresh("rejected");
                if let Err(e) = self.store.delete().await {
                    warn!(error = %e, "failed to delete stored credential");
                }
                for call in drained {
                    complete(call, Err(ApiError::Unauthorized));
                }
            }
            Verdict::Failed(error) => {
                metrics::record_refresh("failed");
                warn!(
                    failed = drained.len(),
                    error = %error,
                    "renewal failed, failing queued requests"
                );
                for call in drained {
                    complete(call, Err(error.clone()));
                }
            }
        }
    }
}

/// Resolve a call's completion exactly once and record the outcome.
fn complete(call: PendingCall, outcome: Result<ApiResponse, ApiError>) {
    let label = match &outcome {
        Ok(response) if response.is_success() => "success",
        Ok(_) => "failed",
        Err(ApiError::Network(_)) => "transport_error",
        Err(ApiError::Unauthorized) => "unauthorized",
        Err(ApiError::RetryLimitExceeded { .. }) => "retry_limit",
        Err(ApiError::QueueFull) => "queue_full",
        Err(_) => "failed",
    };
    metrics::record_api_result(label);
    // The receiver may be gone if the caller abandoned the request
    let _ = call.completion.send(outcome);
}

/// Map a non-terminal renewal failure onto the call-facing taxonomy.
fn refresh_failure(error: &TokenError) -> ApiError {
    match error {
        TokenError::Network(message) => ApiError::Network(message.clone()),
        TokenError::MalformedResponse(message) => ApiError::MalformedResponse(message.clone()),
        TokenError::InvalidGrant(_) => ApiError::Unauthorized,
    }
}

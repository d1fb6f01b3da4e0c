//! Token endpoint grants
//!
//! Handles the three token-endpoint interactions:
//! 1. Authorization-code exchange (interactive flow completion)
//! 2. Client-credentials exchange (app-level token, no user)
//! 3. Refresh (new credential from a refresh token, no interaction)
//!
//! All three POST a form-encoded body to `{server}/oauth/token` with
//! different grant types and parse the JSON response into a `Credential`.
//! Expiry is computed here, at parse time, from the server-reported
//! lifetime — never at the moment the credential is eventually used.

use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;
use transport::{Transport, TransportRequest, TransportResponse};
use url::form_urlencoded;

use crate::callback::CallbackRoute;
use crate::config::ClientConfig;
use crate::credential::{Credential, unix_millis_now};
use crate::error::{Result, TokenError};

/// Response from the token endpoint for every grant type.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Seconds until the access token expires (delta, not absolute)
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub user_id: Option<String>,
}

impl TokenResponse {
    /// Convert into a credential, stamping the absolute expiry now.
    ///
    /// A client-credentials grant never yields a refresh token or a subject,
    /// whatever the provider put in the response.
    pub fn into_credential(self, client_grant: bool) -> Credential {
        let expires_at = self.expires_in.map(|secs| unix_millis_now() + secs * 1000);
        Credential {
            access_token: self.access_token,
            refresh_token: if client_grant { None } else { self.refresh_token },
            expires_at,
            subject_id: if client_grant { None } else { self.user_id },
            is_client_credential: client_grant,
        }
    }
}

/// OAuth-shaped error body returned on a declined grant.
#[derive(Debug, Deserialize)]
struct ProviderRejection {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

/// Client for the provider's token endpoint.
pub struct TokenEndpointClient {
    config: Arc<ClientConfig>,
    transport: Arc<dyn Transport>,
}

impl TokenEndpointClient {
    pub fn new(config: Arc<ClientConfig>, transport: Arc<dyn Transport>) -> Self {
        Self { config, transport }
    }

    /// Exchange an authorization code for a user credential.
    pub async fn exchange_code(&self, code: &str, code_verifier: Option<&str>) -> Result<Credential> {
        let mut params = vec![
            ("grant_type", "authorization_code".to_owned()),
            ("code", code.to_owned()),
            (
                "redirect_uri",
                self.config.redirect_uri(CallbackRoute::Login),
            ),
        ];
        if let Some(verifier) = code_verifier {
            params.push(("code_verifier", verifier.to_owned()));
        }
        self.request_token(params, false).await
    }

    /// Obtain an app-level credential with no user attached.
    pub async fn client_credentials(&self) -> Result<Credential> {
        self.request_token(vec![("grant_type", "client_credentials".to_owned())], true)
            .await
    }

    /// Exchange a refresh token for a new user credential.
    ///
    /// A credential without a refresh token cannot be refreshed; that is an
    /// `InvalidGrant` (re-authorization is the only way forward) and no
    /// request is sent.
    pub async fn refresh(&self, credential: &Credential) -> Result<Credential> {
        let refresh_token = credential.refresh_token.as_deref().ok_or_else(|| {
            TokenError::InvalidGrant("credential has no refresh token".into())
        })?;
        self.request_token(
            vec![
                ("grant_type", "refresh_token".to_owned()),
                ("refresh_token", refresh_token.to_owned()),
            ],
            false,
        )
        .await
    }

    async fn request_token(
        &self,
        params: Vec<(&'static str, String)>,
        client_grant: bool,
    ) -> Result<Credential> {
        let grant = params
            .first()
            .map(|(_, value)| value.clone())
            .unwrap_or_default();

        let body = {
            let mut form = form_urlencoded::Serializer::new(String::new());
            form.append_pair("client_id", &self.config.client_id);
            form.append_pair("client_secret", self.config.client_secret.expose());
            for (key, value) in &params {
                form.append_pair(key, value);
            }
            form.finish()
        };

        let request = TransportRequest::post(self.config.token_url(), body)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .header("Accept", "application/json");

        let response = self
            .transport
            .send(request)
            .await
            .map_err(|e| TokenError::Network(e.to_string()))?;

        if !response.is_success() {
            return Err(rejection(&response));
        }

        let parsed: TokenResponse = serde_json::from_str(&response.body)
            .map_err(|e| TokenError::MalformedResponse(format!("parsing token response: {e}")))?;

        debug!(grant = %grant, expires_in = ?parsed.expires_in, "token grant succeeded");
        Ok(parsed.into_credential(client_grant))
    }
}

/// Map a non-success token endpoint response onto the error taxonomy.
///
/// 401/403 and an OAuth-shaped 400 are the provider declining the grant;
/// timeouts and 5xx are transient; anything else is a schema violation.
fn rejection(response: &TransportResponse) -> TokenError {
    match response.status {
        401 | 403 => TokenError::InvalidGrant(rejection_detail(response)),
        400 => match serde_json::from_str::<ProviderRejection>(&response.body) {
            Ok(body) if body.error.is_some() => TokenError::InvalidGrant(rejection_detail(response)),
            _ => TokenError::MalformedResponse(format!(
                "token endpoint returned 400 without an error body: {}",
                response.body
            )),
        },
        408 | 429 | 500..=599 => {
            TokenError::Network(format!("token endpoint returned {}", response.status))
        }
        status => TokenError::MalformedResponse(format!(
            "unexpected token endpoint status {status}: {}",
            response.body
        )),
    }
}

fn rejection_detail(response: &TransportResponse) -> String {
    match serde_json::from_str::<ProviderRejection>(&response.body) {
        Ok(ProviderRejection {
            error: Some(error),
            error_description,
        }) => match error_description {
            Some(description) => format!("{error}: {description}"),
            None => error,
        },
        _ => format!("status {}: {}", response.status, response.body),
    }
}

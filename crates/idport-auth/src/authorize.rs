//! Interactive-page URL construction
//!
//! Builds the URLs the web-view collaborator is pointed at: authorization,
//! registration, lost-password and logout. All of them redirect back to one
//! of this client's registered callback routes when the user is done.

use url::Url;

use crate::callback::CallbackRoute;
use crate::config::ClientConfig;
use crate::error::UrlError;

/// Build the authorization-code request URL.
///
/// `state` is mandatory; `code_challenge` adds the PKCE parameters when the
/// flow uses them.
pub fn authorization_request_url(
    config: &ClientConfig,
    state: &str,
    code_challenge: Option<&str>,
) -> Result<String, UrlError> {
    interactive_url(config, &config.authorization_url(), state, code_challenge)
}

/// Build the registration page URL. Completes like a login: the redirect
/// carries an authorization code for the freshly created account.
pub fn registration_request_url(
    config: &ClientConfig,
    state: &str,
    code_challenge: Option<&str>,
) -> Result<String, UrlError> {
    interactive_url(config, &config.registration_url(), state, code_challenge)
}

/// Build the lost-password page URL. Same completion shape as login.
pub fn lost_password_request_url(
    config: &ClientConfig,
    state: &str,
    code_challenge: Option<&str>,
) -> Result<String, UrlError> {
    interactive_url(config, &config.lost_password_url(), state, code_challenge)
}

/// Build the provider logout URL.
///
/// The access token identifies the session being terminated; the redirect
/// brings the user back to the app's logout route.
pub fn logout_request_url(config: &ClientConfig, access_token: &str) -> Result<String, UrlError> {
    let mut url = parse_base(&config.logout_url())?;
    url.query_pairs_mut()
        .append_pair("redirect_uri", &config.redirect_uri(CallbackRoute::Logout))
        .append_pair("oauth_token", access_token);
    Ok(url.into())
}

fn interactive_url(
    config: &ClientConfig,
    base: &str,
    state: &str,
    code_challenge: Option<&str>,
) -> Result<String, UrlError> {
    let mut url = parse_base(base)?;
    {
        let mut pairs = url.query_pairs_mut();
        pairs.append_pair("client_id", &config.client_id);
        pairs.append_pair("response_type", "code");
        pairs.append_pair("redirect_uri", &config.redirect_uri(CallbackRoute::Login));
        if let Some(scope) = config.scope.as_deref() {
            pairs.append_pair("scope", scope);
        }
        pairs.append_pair("state", state);
        if let Some(challenge) = code_challenge {
            pairs.append_pair("code_challenge", challenge);
            pairs.append_pair("code_challenge_method", "S256");
        }
    }
    Ok(url.into())
}

fn parse_base(base: &str) -> Result<Url, UrlError> {
    Url::parse(base).map_err(|e| UrlError::Malformed(format!("{base}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> ClientConfig {
        let mut config = ClientConfig::new(
            "https://id.example.com",
            "client-1",
            "secret-1",
            "exampleapp",
        );
        config.scope = Some("profile email".into());
        config
    }

    #[test]
    fn authorization_url_contains_required_params() {
        let url =
            authorization_request_url(&test_config(), "st-123", Some("challenge-abc")).unwrap();

        assert!(url.starts_with("https://id.example.com/auth/login?"));
        assert!(url.contains("client_id=client-1"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("redirect_uri=exampleapp%3A%2F%2Foauth%2Flogin"));
        assert!(url.contains("scope=profile+email"));
        assert!(url.contains("state=st-123"));
        assert!(url.contains("code_challenge=challenge-abc"));
        assert!(url.contains("code_challenge_method=S256"));
    }

    #[test]
    fn scope_and_challenge_are_optional() {
        let mut config = test_config();
        config.scope = None;
        let url = authorization_request_url(&config, "st-1", None).unwrap();
        assert!(!url.contains("scope="));
        assert!(!url.contains("code_challenge"));
        assert!(url.contains("state=st-1"));
    }

    #[test]
    fn registration_and_lost_password_share_the_login_shape() {
        let config = test_config();
        let reg = registration_request_url(&config, "st-1", None).unwrap();
        assert!(reg.starts_with("https://id.example.com/auth/signup?"));
        assert!(reg.contains("redirect_uri=exampleapp%3A%2F%2Foauth%2Flogin"));

        let lost = lost_password_request_url(&config, "st-1", None).unwrap();
        assert!(lost.starts_with("https://id.example.com/auth/forgotpassword?"));
        assert!(lost.contains("response_type=code"));
    }

    #[test]
    fn logout_url_carries_token_and_logout_route() {
        let url = logout_request_url(&test_config(), "at_live").unwrap();
        assert!(url.starts_with("https://id.example.com/logout?"));
        assert!(url.contains("redirect_uri=exampleapp%3A%2F%2Foauth%2Flogout"));
        assert!(url.contains("oauth_token=at_live"));
    }

    #[test]
    fn bad_server_url_is_reported() {
        let config = ClientConfig::new("not a url", "c", "s", "app");
        assert!(matches!(
            authorization_request_url(&config, "st", None),
            Err(UrlError::Malformed(_))
        ));
    }
}

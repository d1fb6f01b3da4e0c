//! App-activation callback routing
//!
//! The provider redirects back to `{scheme}://{host}/{login|logout|failure}`.
//! This module recognizes which of the three routes an inbound callback URL
//! carries and extracts the query parameters the flows care about. It is the
//! whole of the core's URL-parsing surface: everything upstream of it (OS
//! activation events, web-view navigation hooks) just hands over the raw URL.

use url::Url;

use crate::config::ClientConfig;
use crate::error::UrlError;

/// The three redirect routes registered with the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackRoute {
    Login,
    Logout,
    Failure,
}

impl CallbackRoute {
    /// Path suffix of the redirect URI.
    pub fn as_str(&self) -> &'static str {
        match self {
            CallbackRoute::Login => "login",
            CallbackRoute::Logout => "logout",
            CallbackRoute::Failure => "failure",
        }
    }
}

/// A parsed inbound callback.
#[derive(Debug, Clone)]
pub struct Callback {
    pub route: CallbackRoute,
    /// `code` query parameter, present on a successful authorization.
    pub code: Option<String>,
    /// `error` query parameter, present when the provider declined.
    pub error: Option<String>,
    /// `state` query parameter echoed back by the provider.
    pub state: Option<String>,
}

/// Parse and route an inbound callback URL.
///
/// Rejects URLs whose scheme or host do not match this client's registered
/// redirect URI, so activation events meant for other handlers are never
/// mistaken for flow completions.
pub fn parse_callback(config: &ClientConfig, raw: &str) -> Result<Callback, UrlError> {
    let url = Url::parse(raw).map_err(|e| UrlError::Malformed(format!("{raw}: {e}")))?;

    if url.scheme() != config.app_scheme {
        return Err(UrlError::ForeignCallback(format!(
            "scheme {} does not match registered scheme {}",
            url.scheme(),
            config.app_scheme
        )));
    }
    if url.host_str() != Some(config.redirect_host.as_str()) {
        return Err(UrlError::ForeignCallback(format!(
            "host {:?} does not match registered host {}",
            url.host_str(),
            config.redirect_host
        )));
    }

    let route = match url.path().trim_matches('/') {
        "login" => CallbackRoute::Login,
        "logout" => CallbackRoute::Logout,
        "failure" => CallbackRoute::Failure,
        other => {
            return Err(UrlError::ForeignCallback(format!(
                "unknown callback route: {other:?}"
            )));
        }
    };

    let mut code = None;
    let mut error = None;
    let mut state = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            _ => {}
        }
    }

    Ok(Callback {
        route,
        code,
        error,
        state,
    })
}

/// Extract one named query parameter from a URL.
pub fn query_param(raw: &str, name: &str) -> Option<String> {
    let url = Url::parse(raw).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> ClientConfig {
        ClientConfig::new(
            "https://id.example.com",
            "client-1",
            "secret-1",
            "exampleapp",
        )
    }

    #[test]
    fn routes_login_callback_with_code() {
        let cb = parse_callback(
            &test_config(),
            "exampleapp://oauth/login?code=abc123&state=st-1",
        )
        .unwrap();
        assert_eq!(cb.route, CallbackRoute::Login);
        assert_eq!(cb.code.as_deref(), Some("abc123"));
        assert_eq!(cb.state.as_deref(), Some("st-1"));
        assert!(cb.error.is_none());
    }

    #[test]
    fn routes_login_callback_with_error() {
        let cb = parse_callback(
            &test_config(),
            "exampleapp://oauth/login?error=access_denied",
        )
        .unwrap();
        assert_eq!(cb.route, CallbackRoute::Login);
        assert_eq!(cb.error.as_deref(), Some("access_denied"));
        assert!(cb.code.is_none());
    }

    #[test]
    fn routes_logout_and_failure() {
        let cb = parse_callback(&test_config(), "exampleapp://oauth/logout").unwrap();
        assert_eq!(cb.route, CallbackRoute::Logout);

        let cb = parse_callback(&test_config(), "exampleapp://oauth/failure?error=x").unwrap();
        assert_eq!(cb.route, CallbackRoute::Failure);
    }

    #[test]
    fn rejects_foreign_scheme() {
        let result = parse_callback(&test_config(), "otherapp://oauth/login?code=abc");
        assert!(matches!(result, Err(UrlError::ForeignCallback(_))));
    }

    #[test]
    fn rejects_foreign_host() {
        let result = parse_callback(&test_config(), "exampleapp://elsewhere/login?code=abc");
        assert!(matches!(result, Err(UrlError::ForeignCallback(_))));
    }

    #[test]
    fn rejects_unknown_route() {
        let result = parse_callback(&test_config(), "exampleapp://oauth/settings");
        assert!(matches!(result, Err(UrlError::ForeignCallback(_))));
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            parse_callback(&test_config(), "not a url at all"),
            Err(UrlError::Malformed(_))
        ));
    }

    #[test]
    fn decodes_percent_encoded_parameters() {
        let cb = parse_callback(
            &test_config(),
            "exampleapp://oauth/login?code=a%2Fb%3Dc&state=s",
        )
        .unwrap();
        assert_eq!(cb.code.as_deref(), Some("a/b=c"));
    }

    #[test]
    fn query_param_extracts_by_name() {
        let url = "exampleapp://oauth/login?code=abc&state=xyz";
        assert_eq!(query_param(url, "code").as_deref(), Some("abc"));
        assert_eq!(query_param(url, "state").as_deref(), Some("xyz"));
        assert_eq!(query_param(url, "missing"), None);
        assert_eq!(query_param("garbage", "code"), None);
    }
}

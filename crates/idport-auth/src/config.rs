//! Client configuration
//!
//! Identifies this application to the provider and carries the orchestration
//! knobs. The client secret is held in a `common::Secret` so it never leaks
//! through Debug output or logs. Endpoint URLs are derived from the provider
//! base URL the way the provider documents them; nothing here performs I/O.

use std::time::Duration;

use common::Secret;
use url::Url;

use crate::callback::CallbackRoute;

/// Configuration for one provider/client pair.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the identity provider, without a trailing slash.
    pub server_url: String,
    /// Client identifier issued by the provider.
    pub client_id: String,
    /// Client secret issued by the provider.
    pub client_secret: Secret<String>,
    /// URL scheme registered for app activation (`myapp` in `myapp://...`).
    pub app_scheme: String,
    /// Host component of the redirect URI.
    pub redirect_host: String,
    /// Scope requested during authorization, if any.
    pub scope: Option<String>,
    /// Provider API version segment for authenticated calls.
    pub api_version: String,
    /// Total transport attempts per request (original send + retries).
    pub max_attempts: u32,
    /// Bound on the pending-request queue during a refresh.
    pub queue_capacity: usize,
    /// A credential expiring within this window is renewed before sending.
    pub expiry_leeway: Duration,
}

impl ClientConfig {
    /// Build a configuration with the provider defaults.
    pub fn new(
        server_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<Secret<String>>,
        app_scheme: impl Into<String>,
    ) -> Self {
        let server_url = server_url.into();
        Self {
            server_url: server_url.trim_end_matches('/').to_owned(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            app_scheme: app_scheme.into(),
            redirect_host: "oauth".into(),
            scope: None,
            api_version: "2".into(),
            max_attempts: 3,
            queue_capacity: 32,
            expiry_leeway: Duration::from_secs(30),
        }
    }

    /// Validate the configuration.
    ///
    /// Rejects values that would produce unusable URLs or degenerate
    /// orchestration (zero attempts, zero queue slots).
    pub fn validate(&self) -> common::Result<()> {
        let url = Url::parse(&self.server_url)
            .map_err(|e| common::Error::Config(format!("server_url is not a URL: {e}")))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(common::Error::Config(format!(
                "server_url must be http(s), got: {}",
                self.server_url
            )));
        }
        if self.client_id.is_empty() {
            return Err(common::Error::Config("client_id must not be empty".into()));
        }
        if self.app_scheme.is_empty()
            || !self
                .app_scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.')
        {
            return Err(common::Error::Config(format!(
                "app_scheme must be a valid URL scheme, got: {}",
                self.app_scheme
            )));
        }
        if self.max_attempts == 0 {
            return Err(common::Error::Config(
                "max_attempts must be greater than 0".into(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(common::Error::Config(
                "queue_capacity must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// `{server}/auth/login` — interactive authorization page.
    pub fn authorization_url(&self) -> String {
        format!("{}/auth/login", self.server_url)
    }

    /// `{server}/auth/signup` — interactive registration page.
    pub fn registration_url(&self) -> String {
        format!("{}/auth/signup", self.server_url)
    }

    /// `{server}/auth/forgotpassword` — interactive password recovery page.
    pub fn lost_password_url(&self) -> String {
        format!("{}/auth/forgotpassword", self.server_url)
    }

    /// `{server}/oauth/token` — token endpoint for all grants.
    pub fn token_url(&self) -> String {
        format!("{}/oauth/token", self.server_url)
    }

    /// `{server}/logout` — provider-side session termination.
    pub fn logout_url(&self) -> String {
        format!("{}/logout", self.server_url)
    }

    /// `{server}/api/{version}/{path}` — authenticated API call target.
    pub fn api_url(&self, path: &str) -> String {
        format!(
            "{}/api/{}/{}",
            self.server_url,
            self.api_version,
            path.trim_start_matches('/')
        )
    }

    /// `{scheme}://{host}/{route}` — redirect URI for one callback route.
    pub fn redirect_uri(&self, route: CallbackRoute) -> String {
        format!(
            "{}://{}/{}",
            self.app_scheme,
            self.redirect_host,
            route.as_str()
        )
    }
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
    fn trailing_slash_is_normalized() {
        let config = ClientConfig::new("https://id.example.com/", "c", "s", "app");
        assert_eq!(config.server_url, "https://id.example.com");
        assert_eq!(config.token_url(), "https://id.example.com/oauth/token");
    }

    #[test]
    fn derived_endpoints() {
        let config = test_config();
        assert_eq!(
            config.authorization_url(),
            "https://id.example.com/auth/login"
        );
        assert_eq!(config.token_url(), "https://id.example.com/oauth/token");
        assert_eq!(config.logout_url(), "https://id.example.com/logout");
        assert_eq!(
            config.registration_url(),
            "https://id.example.com/auth/signup"
        );
        assert_eq!(
            config.lost_password_url(),
            "https://id.example.com/auth/forgotpassword"
        );
    }

    #[test]
    fn api_url_uses_version_and_trims_leading_slash() {
        let mut config = test_config();
        assert_eq!(config.api_url("/me"), "https://id.example.com/api/2/me");
        assert_eq!(config.api_url("me"), "https://id.example.com/api/2/me");

        config.api_version = "3".into();
        assert_eq!(
            config.api_url("user/42/logins"),
            "https://id.example.com/api/3/user/42/logins"
        );
    }

    #[test]
    fn redirect_uri_routes() {
        let config = test_config();
        assert_eq!(
            config.redirect_uri(CallbackRoute::Login),
            "exampleapp://oauth/login"
        );
        assert_eq!(
            config.redirect_uri(CallbackRoute::Logout),
            "exampleapp://oauth/logout"
        );
        assert_eq!(
            config.redirect_uri(CallbackRoute::Failure),
            "exampleapp://oauth/failure"
        );
    }

    #[test]
    fn validate_accepts_sane_config() {
        assert!(test_config().validate().is_ok());
    }

    #[test]
    fn validate_rejects_non_http_server_url() {
        let config = ClientConfig::new("ftp://id.example.com", "c", "s", "app");
        assert!(config.validate().is_err());

        let config = ClientConfig::new("not a url", "c", "s", "app");
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_client_id() {
        let config = ClientConfig::new("https://id.example.com", "", "s", "app");
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_app_scheme() {
        let config = ClientConfig::new("https://id.example.com", "c", "s", "bad scheme");
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_bounds() {
        let mut config = test_config();
        config.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = test_config();
        config.queue_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn debug_redacts_client_secret() {
        let debug = format!("{:?}", test_config());
        assert!(!debug.contains("secret-1"), "secret leaked: {debug}");
        assert!(debug.contains("[REDACTED]"));
    }
}

//! The credential entity
//!
//! An immutable value object: every lifecycle transition (acquisition,
//! refresh, logout) replaces the whole value rather than mutating fields, so
//! a concurrent reader can never observe a half-updated credential.
//!
//! `expires_at` is a unix timestamp in milliseconds (absolute, not a delta).
//! It is computed at response-parse time from the server-reported lifetime,
//! so network latency is not double-counted against the token.

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Current wall-clock time as unix milliseconds.
pub fn unix_millis_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// A bearer credential plus the metadata needed to manage its lifetime.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Opaque bearer value attached to authenticated calls.
    pub access_token: String,
    /// Present only for user grants; client credentials never carry one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Absolute expiry in unix milliseconds; absent means non-expiring
    /// until the provider rejects it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,
    /// Identifies the authenticated user; absent for app-level credentials.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<String>,
    /// True when obtained via the client-credentials grant.
    #[serde(default)]
    pub is_client_credential: bool,
}

impl Credential {
    /// Whether the credential is past its expiry instant.
    ///
    /// A credential without an expiry is treated as unexpired until a
    /// request is rejected.
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(at) => at <= unix_millis_now(),
            None => false,
        }
    }

    /// Whether the credential will still be valid `leeway` from now.
    ///
    /// Used as the pre-send check so a request is not dispatched with a
    /// token that dies mid-flight.
    pub fn usable_for(&self, leeway: Duration) -> bool {
        match self.expires_at {
            Some(at) => at > unix_millis_now() + leeway.as_millis() as u64,
            None => true,
        }
    }

    /// Whether a new credential can be obtained without user interaction.
    pub fn can_renew(&self) -> bool {
        self.refresh_token.is_some() || self.is_client_credential
    }
}

// Token values never appear in Debug output; everything else does.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expires_at", &self.expires_at)
            .field("subject_id", &self.subject_id)
            .field("is_client_credential", &self.is_client_credential)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_credential(expires_at: Option<u64>) -> Credential {
        Credential {
            access_token: "at_1".into(),
            refresh_token: Some("rt_1".into()),
            expires_at,
            subject_id: Some("user-1".into()),
            is_client_credential: false,
        }
    }

    /// Expiry far in the future (year 2100).
    fn future_expiry() -> u64 {
        4_102_444_800_000
    }

    #[test]
    fn absent_expiry_is_never_expired() {
        let cred = user_credential(None);
        assert!(!cred.is_expired());
        assert!(cred.usable_for(Duration::from_secs(3600)));
    }

    #[test]
    fn past_expiry_is_expired() {
        let cred = user_credential(Some(1_000_000_000));
        assert!(cred.is_expired());
        assert!(!cred.usable_for(Duration::ZERO));
    }

    #[test]
    fn future_expiry_is_usable() {
        let cred = user_credential(Some(future_expiry()));
        assert!(!cred.is_expired());
        assert!(cred.usable_for(Duration::from_secs(30)));
    }

    #[test]
    fn usable_for_respects_leeway() {
        // Expires in ~10 seconds: fine with no leeway, not with 30s leeway
        let cred = user_credential(Some(unix_millis_now() + 10_000));
        assert!(!cred.is_expired());
        assert!(cred.usable_for(Duration::ZERO));
        assert!(!cred.usable_for(Duration::from_secs(30)));
    }

    #[test]
    fn renewability() {
        assert!(user_credential(None).can_renew());

        let no_refresh = Credential {
            refresh_token: None,
            ..user_credential(None)
        };
        assert!(!no_refresh.can_renew());

        let client = Credential {
            access_token: "at_app".into(),
            refresh_token: None,
            expires_at: None,
            subject_id: None,
            is_client_credential: true,
        };
        assert!(client.can_renew());
    }

    #[test]
    fn serde_roundtrip_preserves_all_fields() {
        let cred = user_credential(Some(future_expiry()));
        let json = serde_json::to_string(&cred).unwrap();
        let back: Credential = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cred);
    }

    #[test]
    fn absent_optionals_are_omitted_from_json() {
        let client = Credential {
            access_token: "at_app".into(),
            refresh_token: None,
            expires_at: None,
            subject_id: None,
            is_client_credential: true,
        };
        let json = serde_json::to_string(&client).unwrap();
        assert!(!json.contains("refresh_token"));
        assert!(!json.contains("subject_id"));
        assert!(json.contains("\"is_client_credential\":true"));
    }

    #[test]
    fn debug_redacts_token_values() {
        let debug = format!("{:?}", user_credential(Some(future_expiry())));
        assert!(!debug.contains("at_1"), "access token leaked: {debug}");
        assert!(!debug.contains("rt_1"), "refresh token leaked: {debug}");
        assert!(debug.contains("user-1"), "subject should be visible: {debug}");
    }
}

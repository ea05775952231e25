//! Identity-provider session types.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Opaque bearer token issued by the identity provider.
///
/// The raw value is kept in a [`SecretString`] so it never shows up in
/// `Debug` output or logs.
#[derive(Clone)]
pub struct AccessToken(Arc<SecretString>);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Arc::new(SecretString::from(token.into())))
    }

    /// Raw token value, for building request headers.
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    /// `Authorization` header value for this token.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.expose())
    }
}

impl PartialEq for AccessToken {
    fn eq(&self, other: &Self) -> bool {
        self.expose() == other.expose()
    }
}

impl Eq for AccessToken {}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken([REDACTED])")
    }
}

/// The external (identity-provider) user behind a session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    /// Provider user id.
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl UserIdentity {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
        }
    }

    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

/// An authenticated identity-provider session.
///
/// Immutable once issued: a token refresh produces a new `Session`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub access_token: AccessToken,
    pub user: UserIdentity,
    /// Expiry as Unix seconds, when the provider reports one.
    pub expires_at: Option<u64>,
}

impl Session {
    pub fn new(access_token: impl Into<String>, user: UserIdentity) -> Self {
        Self {
            access_token: AccessToken::new(access_token),
            user,
            expires_at: None,
        }
    }

    #[must_use]
    pub fn with_expiry(mut self, expires_at: u64) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn user_id(&self) -> &str {
        &self.user.id
    }

    /// `Authorization` header value for requests made with this session.
    pub fn authorization_header(&self) -> String {
        self.access_token.bearer()
    }

    /// Whether the provider-reported expiry has passed.
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => {
                let now = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map(|d| d.as_secs())
                    .unwrap_or(0);
                now >= expires_at
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_is_redacted() {
        let session = Session::new("super-secret", UserIdentity::new("user_1"));
        let debug = format!("{:?}", session);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn test_authorization_header() {
        let session = Session::new("tok_123", UserIdentity::new("user_1"));
        assert_eq!(session.authorization_header(), "Bearer tok_123");
    }

    #[test]
    fn test_expiry() {
        let session = Session::new("t", UserIdentity::new("u"));
        assert!(!session.is_expired());
        assert!(session.clone().with_expiry(1).is_expired());
        assert!(!session.with_expiry(u64::MAX).is_expired());
    }

    #[test]
    fn test_sessions_compare_by_token_and_user() {
        let a = Session::new("t1", UserIdentity::new("u"));
        let b = Session::new("t1", UserIdentity::new("u"));
        let c = Session::new("t2", UserIdentity::new("u"));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}

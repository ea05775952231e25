//! Identity-provider redirect callback.
//!
//! The provider redirects back with either `?code=...` or
//! `?error=...&error_description=...`. A code is exchanged for a session,
//! then the session is polled for (bounded attempts, fixed delay) before the
//! user is sent on. Every failure is terminal for the flow and ends with a
//! redirect to the login page.

use crate::config::CallbackConfig;
use crate::error::TenantryError;
use crate::session::{Session, SessionStore};
use crate::traits::identity::IdentityProvider;
use crate::utils::{RetryExhausted, poll_until};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Why a callback did not establish a session.
#[derive(Debug, Error)]
pub enum CallbackError {
    /// The provider redirected back with an error.
    #[error("{message}")]
    Provider { message: String },

    /// The authorization code was rejected.
    #[error("Code exchange failed: {0}")]
    Exchange(#[source] TenantryError),

    /// The session never appeared.
    #[error("Session was not established: {0}")]
    SessionTimeout(#[from] RetryExhausted),

    #[error("Malformed callback URL: {0}")]
    MalformedUrl(#[from] url::ParseError),
}

impl CallbackError {
    /// Message to show while redirecting to login.
    pub fn user_message(&self) -> String {
        match self {
            Self::Provider { message } => message.clone(),
            Self::Exchange(e) => e
                .detail()
                .map(str::to_string)
                .unwrap_or_else(|| "Could not complete sign in".to_string()),
            Self::SessionTimeout(_) => "Sign in timed out. Please try again.".to_string(),
            Self::MalformedUrl(_) => "Authentication failed. Redirecting...".to_string(),
        }
    }
}

/// Where the callback page goes next.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// Session established; continue into the application.
    Established {
        session: Session,
        redirect_to: String,
        after: Duration,
    },
    /// Show `message`, then return to login.
    Failed {
        message: String,
        redirect_to: String,
        after: Duration,
    },
}

impl CallbackOutcome {
    pub fn redirect_to(&self) -> &str {
        match self {
            Self::Established { redirect_to, .. } | Self::Failed { redirect_to, .. } => redirect_to,
        }
    }

    pub fn is_established(&self) -> bool {
        matches!(self, Self::Established { .. })
    }
}

/// Completes sign-in after the provider redirect.
pub struct CallbackHandler {
    provider: Arc<dyn IdentityProvider>,
    sessions: SessionStore,
    config: CallbackConfig,
}

impl CallbackHandler {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        sessions: SessionStore,
        config: CallbackConfig,
    ) -> Self {
        Self {
            provider,
            sessions,
            config,
        }
    }

    pub fn config(&self) -> &CallbackConfig {
        &self.config
    }

    /// Handle the full callback URL and decide where to go next.
    #[instrument(skip_all)]
    pub async fn handle(&self, callback_url: &str) -> CallbackOutcome {
        match self.complete(callback_url).await {
            Ok(session) => {
                info!(user_id = %session.user_id(), "Sign in completed");
                CallbackOutcome::Established {
                    session,
                    redirect_to: self.config.home_path.clone(),
                    after: self.config.success_redirect_delay(),
                }
            }
            Err(e) => {
                warn!(target: "auth.callback_failed", error = %e, "Sign in failed");
                CallbackOutcome::Failed {
                    message: e.user_message(),
                    redirect_to: self.config.login_path.clone(),
                    after: self.config.error_redirect_delay(),
                }
            }
        }
    }

    /// Run the callback steps, returning the established session.
    pub async fn complete(&self, callback_url: &str) -> Result<Session, CallbackError> {
        let url = Url::parse(callback_url)?;
        let mut code = None;
        let mut error = None;
        let mut description = None;

        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "code" => code = Some(value.into_owned()),
                "error" => error = Some(value.into_owned()),
                "error_description" => description = Some(value.into_owned()),
                _ => {}
            }
        }

        if let Some(error) = error {
            return Err(CallbackError::Provider {
                message: description.filter(|d| !d.is_empty()).unwrap_or(error),
            });
        }

        if let Some(code) = code {
            let session = self
                .provider
                .exchange_code_for_session(&code)
                .await
                .map_err(CallbackError::Exchange)?;
            debug!("Authorization code exchanged");
            self.sessions.set_session(Some(session));
        }

        self.await_session().await
    }

    async fn await_session(&self) -> Result<Session, CallbackError> {
        let session = poll_until(
            self.config.max_attempts,
            self.config.retry_delay(),
            |attempt| async move {
                if let Some(session) = self.sessions.current() {
                    return Some(session);
                }
                match self.provider.get_session().await {
                    Ok(Some(session)) => {
                        self.sessions.set_session(Some(session.clone()));
                        Some(session)
                    }
                    Ok(None) => None,
                    Err(e) => {
                        debug!(attempt, error = %e, "Session check failed");
                        None
                    }
                }
            },
        )
        .await?;
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::UserIdentity;
    use crate::testing::StaticIdentityProvider;

    const BASE: &str = "https://app.example.com/auth/callback";

    fn handler(provider: &StaticIdentityProvider) -> (CallbackHandler, SessionStore) {
        let sessions = SessionStore::new();
        let config = CallbackConfig {
            max_attempts: 3,
            ..CallbackConfig::default()
        };
        let handler = CallbackHandler::new(Arc::new(provider.clone()), sessions.clone(), config);
        (handler, sessions)
    }

    fn session() -> Session {
        Session::new("token", UserIdentity::new("u1"))
    }

    #[tokio::test]
    async fn test_provider_error_redirects_to_login() {
        let provider = StaticIdentityProvider::signed_out();
        let (handler, _) = handler(&provider);

        let outcome = handler
            .handle(&format!("{}?error=access_denied&error_description=User%20cancelled", BASE))
            .await;

        assert_eq!(
            outcome,
            CallbackOutcome::Failed {
                message: "User cancelled".to_string(),
                redirect_to: "/auth".to_string(),
                after: Duration::from_secs(3),
            }
        );
        assert_eq!(provider.get_session_calls(), 0);
    }

    #[tokio::test]
    async fn test_error_without_description_uses_error() {
        let provider = StaticIdentityProvider::signed_out();
        let (handler, _) = handler(&provider);

        let err = handler
            .complete(&format!("{}?error=access_denied", BASE))
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), "access_denied");
    }

    #[tokio::test]
    async fn test_code_exchange_establishes_session() {
        let provider = StaticIdentityProvider::signed_out();
        provider.accept_code("abc", session());
        let (handler, sessions) = handler(&provider);

        let outcome = handler.handle(&format!("{}?code=abc", BASE)).await;

        assert!(outcome.is_established());
        assert_eq!(outcome.redirect_to(), "/dashboard");
        assert_eq!(sessions.current().unwrap().user_id(), "u1");
    }

    #[tokio::test]
    async fn test_rejected_code_is_terminal() {
        let provider = StaticIdentityProvider::signed_out();
        let (handler, sessions) = handler(&provider);

        let err = handler.complete(&format!("{}?code=bogus", BASE)).await.unwrap_err();

        assert!(matches!(err, CallbackError::Exchange(_)));
        assert_eq!(err.user_message(), "Invalid authorization code");
        assert!(sessions.current().is_none());
        assert_eq!(provider.get_session_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_appears_after_polling() {
        let provider = StaticIdentityProvider::signed_in(session());
        provider.hide_session_for(2);
        let (handler, sessions) = handler(&provider);

        let established = handler.complete(BASE).await.unwrap();

        assert_eq!(established.user_id(), "u1");
        assert_eq!(provider.get_session_calls(), 3);
        assert!(sessions.current().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_never_appears() {
        let provider = StaticIdentityProvider::signed_out();
        let (handler, _) = handler(&provider);

        let outcome = handler.handle(BASE).await;

        match outcome {
            CallbackOutcome::Failed { redirect_to, .. } => assert_eq!(redirect_to, "/auth"),
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(provider.get_session_calls(), 3);
    }

    #[tokio::test]
    async fn test_malformed_url_is_terminal() {
        let provider = StaticIdentityProvider::signed_out();
        let (handler, _) = handler(&provider);

        let err = handler.complete("not a url").await.unwrap_err();
        assert!(matches!(err, CallbackError::MalformedUrl(_)));
    }
}

//! Profile resolver.
//!
//! Fetches the profile for a session, creating it through the verify
//! endpoint when the fetch fails.

use super::types::Profile;
use crate::session::Session;
use crate::traits::workspace::WorkspaceApi;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Obtains (or lazily creates) the application profile for a session.
///
/// Stateless: the caller decides whether a result is still current before
/// committing it.
#[derive(Clone)]
pub struct ProfileResolver {
    api: Arc<dyn WorkspaceApi>,
}

impl ProfileResolver {
    pub fn new(api: Arc<dyn WorkspaceApi>) -> Self {
        Self { api }
    }

    /// Resolve the profile for `session`.
    ///
    /// Tries `GET /auth/me`, then `POST /auth/verify` on any failure. Returns
    /// `None` (and logs) when both fail; the caller proceeds without a
    /// profile.
    #[instrument(skip_all, fields(user_id = %session.user_id()))]
    pub async fn resolve(&self, session: &Session) -> Option<Profile> {
        let token = &session.access_token;

        let fetch_error = match self.api.fetch_profile(token).await {
            Ok(profile) => return Some(profile),
            Err(e) => e,
        };
        debug!(error = %fetch_error, "Profile fetch failed, trying verify");

        match self.api.verify_profile(token).await {
            Ok(profile) => Some(profile),
            Err(e) => {
                warn!(
                    target: "profile.resolve_failed",
                    fetch_error = %fetch_error,
                    verify_error = %e,
                    "Failed to fetch or create profile"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::UserIdentity;
    use crate::testing::InMemoryWorkspaceApi;

    fn setup() -> (InMemoryWorkspaceApi, ProfileResolver, Session) {
        let api = InMemoryWorkspaceApi::new();
        let session = api.sign_in("user_1", "ada@example.com");
        let resolver = ProfileResolver::new(Arc::new(api.clone()));
        (api, resolver, session)
    }

    #[tokio::test]
    async fn test_existing_profile_is_fetched() {
        let (api, resolver, session) = setup();
        api.insert_profile("user_1", Profile::new("p1").with_name("Ada"));

        let profile = resolver.resolve(&session).await.unwrap();
        assert_eq!(profile.id, "p1");
        assert_eq!(api.calls("POST /auth/verify"), 0);
    }

    #[tokio::test]
    async fn test_missing_profile_is_created_via_verify() {
        let (api, resolver, session) = setup();

        let profile = resolver.resolve(&session).await.unwrap();
        assert_eq!(profile.email.as_deref(), Some("ada@example.com"));
        assert_eq!(api.calls("GET /auth/me"), 1);
        assert_eq!(api.calls("POST /auth/verify"), 1);

        // Second resolution finds the created profile directly
        resolver.resolve(&session).await.unwrap();
        assert_eq!(api.calls("POST /auth/verify"), 1);
    }

    #[tokio::test]
    async fn test_both_failing_yields_none() {
        let (api, resolver, session) = setup();
        api.set_offline(true);

        assert!(resolver.resolve(&session).await.is_none());
    }

    #[tokio::test]
    async fn test_unknown_token_yields_none() {
        let (_api, resolver, _session) = setup();
        let stranger = Session::new("forged", UserIdentity::new("nobody"));

        assert!(resolver.resolve(&stranger).await.is_none());
    }
}

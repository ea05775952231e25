//! Identity provider trait
//!
//! The boundary to the external identity provider. Token issuance, the
//! OAuth/PKCE redirect and token refresh all live behind it.

use crate::error::Result;
use crate::session::Session;
use async_trait::async_trait;

/// Identity provider operations the client depends on.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Look up the currently established session, if any.
    ///
    /// Implementations must bound the call with their own timeout.
    async fn get_session(&self) -> Result<Option<Session>>;

    /// Exchange a redirect authorization code for a session.
    async fn exchange_code_for_session(&self, code: &str) -> Result<Session>;

    /// End the session with the provider.
    async fn sign_out(&self) -> Result<()>;
}

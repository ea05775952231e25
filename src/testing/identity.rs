//! Scriptable identity provider.

use crate::error::{Result, TenantryError};
use crate::session::Session;
use crate::traits::identity::IdentityProvider;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct ProviderState {
    session: Option<Session>,
    codes: HashMap<String, Session>,
    hidden_polls: u32,
    fail_get_session: bool,
    fail_sign_out: bool,
    get_session_calls: usize,
    sign_out_calls: usize,
}

/// Identity provider returning a scripted session.
///
/// Cloning shares the same state, so a test can keep a handle and change
/// the provider's answers after handing it to the code under test.
#[derive(Clone, Default)]
pub struct StaticIdentityProvider {
    state: Arc<Mutex<ProviderState>>,
}

impl StaticIdentityProvider {
    /// Provider with no session.
    #[must_use]
    pub fn signed_out() -> Self {
        Self::default()
    }

    /// Provider whose startup check returns `session`.
    #[must_use]
    pub fn signed_in(session: Session) -> Self {
        let provider = Self::default();
        provider.set_session(Some(session));
        provider
    }

    /// Replace the session the provider reports.
    pub fn set_session(&self, session: Option<Session>) {
        self.state.lock().unwrap().session = session;
    }

    /// Accept `code` in a callback exchange, yielding `session`.
    pub fn accept_code(&self, code: &str, session: Session) {
        self.state
            .lock()
            .unwrap()
            .codes
            .insert(code.to_string(), session);
    }

    /// Report no session for the next `polls` calls to `get_session`.
    pub fn hide_session_for(&self, polls: u32) {
        self.state.lock().unwrap().hidden_polls = polls;
    }

    pub fn fail_get_session(&self, fail: bool) {
        self.state.lock().unwrap().fail_get_session = fail;
    }

    pub fn fail_sign_out(&self, fail: bool) {
        self.state.lock().unwrap().fail_sign_out = fail;
    }

    pub fn get_session_calls(&self) -> usize {
        self.state.lock().unwrap().get_session_calls
    }

    pub fn sign_out_calls(&self) -> usize {
        self.state.lock().unwrap().sign_out_calls
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn get_session(&self) -> Result<Option<Session>> {
        let mut state = self.state.lock().unwrap();
        state.get_session_calls += 1;

        if state.fail_get_session {
            return Err(TenantryError::service_unavailable("Identity provider unreachable"));
        }
        if state.hidden_polls > 0 {
            state.hidden_polls -= 1;
            return Ok(None);
        }
        Ok(state.session.clone())
    }

    async fn exchange_code_for_session(&self, code: &str) -> Result<Session> {
        let mut state = self.state.lock().unwrap();
        let session = state
            .codes
            .remove(code)
            .ok_or_else(|| TenantryError::unauthorized("Invalid authorization code"))?;
        state.session = Some(session.clone());
        Ok(session)
    }

    async fn sign_out(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.sign_out_calls += 1;

        if state.fail_sign_out {
            return Err(TenantryError::service_unavailable("Identity provider unreachable"));
        }
        state.session = None;
        Ok(())
    }
}

//! Session synchronization state machine.
//!
//! The orchestrator listens to the [`SessionStore`], loads the profile and
//! the startup directory for each new session, and publishes one consistent
//! [`AuthSnapshot`] that the rest of the application reads synchronously.
//!
//! ```text
//! Initializing --absent--> Unauthenticated
//!      |                        |
//!      +-------present----------+--> Authenticating --both loads done--> Ready
//!                                         ^   |                           |
//!                                         +---+ session change (restart)  |
//! any --sign_out()--> SigningOut --> Unauthenticated <----absent----------+
//! ```
//!
//! Loads run concurrently and may finish in any order. A result is committed
//! only while its [`RequestTicket`] is the latest for that resource under the
//! current session generation, so a slow response for a superseded session
//! never overwrites newer state.

use super::guard::{RequestGate, RequestTicket};
use crate::config::Config;
use crate::error::Result as ApiResult;
use crate::profile::{Profile, ProfileResolver};
use crate::session::{ListenerHandle, Session, SessionStore, UserIdentity};
use crate::storage::{FileKeyValueStore, InMemoryKeyValueStore};
use crate::tenants::{
    DEFAULT_SELECTION_KEY, NewStartup, PermissionSet, Result, Startup, TenantDirectory,
    TenantError,
};
use crate::traits::identity::IdentityProvider;
use crate::traits::storage::KeyValueStore;
use crate::traits::workspace::WorkspaceApi;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};
use validator::Validate;

/// Orchestrator lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AuthState {
    /// Startup session check has not resolved yet.
    Initializing,
    Unauthenticated,
    /// Session present; profile and startups loading.
    Authenticating,
    /// Session present and both loads completed (not necessarily succeeded).
    Ready,
    /// Sign-out in progress.
    SigningOut,
}

impl AuthState {
    /// True while consumers should show a loading state.
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Initializing | Self::Authenticating)
    }
}

/// Everything the application reads about the signed-in user, published
/// atomically.
#[derive(Clone, Debug, PartialEq)]
pub struct AuthSnapshot {
    pub state: AuthState,
    pub user: Option<UserIdentity>,
    pub profile: Option<Profile>,
    pub session: Option<Session>,
    /// True only while `Initializing` or `Authenticating`.
    pub loading: bool,
    /// The startup load for the current session completed at least once,
    /// successfully or not. Distinguishes "loading" from "loaded but empty".
    pub tenants_loaded: bool,
    /// Always an element of `startups` when present.
    pub current_startup: Option<Startup>,
    pub startups: Vec<Startup>,
    /// Derived from the current startup's role; member permissions when none.
    pub permissions: PermissionSet,
}

impl AuthSnapshot {
    fn initial() -> Self {
        Self {
            state: AuthState::Initializing,
            user: None,
            profile: None,
            session: None,
            loading: true,
            tenants_loaded: false,
            current_startup: None,
            startups: Vec::new(),
            permissions: PermissionSet::none(),
        }
    }

    /// `Bearer <token>`, or an empty string without a session.
    pub fn authorization_header(&self) -> String {
        self.session
            .as_ref()
            .map(Session::authorization_header)
            .unwrap_or_default()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }
}

struct OrchestratorState {
    phase: AuthState,
    generation: u64,
    session: Option<Session>,
    profile: Option<Profile>,
    tenants_loaded: bool,
    profile_requests: RequestGate,
    tenant_requests: RequestGate,
}

impl Default for OrchestratorState {
    fn default() -> Self {
        Self {
            phase: AuthState::Initializing,
            generation: 0,
            session: None,
            profile: None,
            tenants_loaded: false,
            profile_requests: RequestGate::default(),
            tenant_requests: RequestGate::default(),
        }
    }
}

struct Inner {
    provider: Arc<dyn IdentityProvider>,
    api: Arc<dyn WorkspaceApi>,
    sessions: SessionStore,
    profiles: ProfileResolver,
    directory: TenantDirectory,
    state: Mutex<OrchestratorState>,
    snapshots: watch::Sender<AuthSnapshot>,
    listener: Mutex<Option<ListenerHandle>>,
    runtime: Mutex<Option<Handle>>,
}

/// Injected state holder for authentication and tenant context.
///
/// Cheap to clone; all clones share one state machine. Create it once at
/// application startup, call [`start`](Self::start), and hand clones to
/// whatever needs the current user, startup or permissions.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use tenantry::auth::{AuthOrchestrator, AuthState};
///
/// let auth = AuthOrchestrator::new(provider, api, storage);
/// auth.start().await;
///
/// let snapshot = auth.wait_until_settled().await;
/// if snapshot.state == AuthState::Ready && snapshot.permissions.can_manage_team {
///     // show the team page
/// }
/// ```
#[derive(Clone)]
pub struct AuthOrchestrator {
    inner: Arc<Inner>,
}

impl AuthOrchestrator {
    /// Create an orchestrator with a fresh [`SessionStore`] and the default
    /// selection key.
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        api: Arc<dyn WorkspaceApi>,
        storage: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self::builder(provider, api).storage(storage).build()
    }

    pub fn builder(
        provider: Arc<dyn IdentityProvider>,
        api: Arc<dyn WorkspaceApi>,
    ) -> AuthOrchestratorBuilder {
        AuthOrchestratorBuilder::new(provider, api)
    }

    /// Build from configuration: selection key and storage backend come from
    /// `config.storage`.
    pub fn from_config(
        config: &Config,
        provider: Arc<dyn IdentityProvider>,
        api: Arc<dyn WorkspaceApi>,
    ) -> Self {
        let storage: Arc<dyn KeyValueStore> = match &config.storage.path {
            Some(path) => Arc::new(FileKeyValueStore::open(path)),
            None => Arc::new(InMemoryKeyValueStore::new()),
        };
        Self::builder(provider, api)
            .storage(storage)
            .selection_key(config.storage.selection_key.clone())
            .build()
    }

    /// Subscribe to session changes and resolve the startup session.
    ///
    /// Returns the snapshot right after the check; a present session is
    /// still loading at that point (see [`wait_until_settled`](Self::wait_until_settled)).
    /// Calling `start` again re-runs the check.
    #[instrument(skip_all)]
    pub async fn start(&self) -> AuthSnapshot {
        *lock(&self.inner.runtime) = Some(Handle::current());

        {
            let mut listener = lock(&self.inner.listener);
            if listener.is_none() {
                let weak: Weak<Inner> = Arc::downgrade(&self.inner);
                *listener = Some(self.inner.sessions.on_session_change(move |session| {
                    if let Some(inner) = weak.upgrade() {
                        inner.on_session_changed(session.cloned());
                    }
                }));
            }
        }

        self.inner
            .sessions
            .initialize(self.inner.provider.as_ref())
            .await;
        self.snapshot()
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> AuthSnapshot {
        self.inner.snapshots.borrow().clone()
    }

    /// Receiver notified on every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<AuthSnapshot> {
        self.inner.snapshots.subscribe()
    }

    /// Wait until the snapshot is no longer loading and return it.
    pub async fn wait_until_settled(&self) -> AuthSnapshot {
        let mut rx = self.subscribe();
        match rx.wait_for(|snapshot| !snapshot.loading).await {
            Ok(snapshot) => snapshot.clone(),
            Err(_) => self.snapshot(),
        }
    }

    /// `Bearer <token>` for the current session, or an empty string.
    pub fn authorization_header(&self) -> String {
        self.inner
            .sessions
            .current()
            .map(|s| s.authorization_header())
            .unwrap_or_default()
    }

    pub fn session_store(&self) -> &SessionStore {
        &self.inner.sessions
    }

    pub fn directory(&self) -> &TenantDirectory {
        &self.inner.directory
    }

    pub fn workspace_api(&self) -> Arc<dyn WorkspaceApi> {
        Arc::clone(&self.inner.api)
    }

    pub fn identity_provider(&self) -> Arc<dyn IdentityProvider> {
        Arc::clone(&self.inner.provider)
    }

    /// Reload the startup list for the current session.
    ///
    /// Returns the current startup after the reload. On failure the previous
    /// directory is kept and the error returned. If a newer reload for the same
    /// session overtakes this one, the directory's current startup is
    /// returned; if the session changed while the request was in flight, the
    /// result is dropped and [`TenantError::SessionChanged`] returned.
    #[instrument(skip_all)]
    pub async fn refresh_startups(&self) -> Result<Option<Startup>> {
        let (session, ticket) = {
            let mut state = self.inner.lock_state();
            let session = state.session.clone().ok_or(TenantError::NoSession)?;
            let generation = state.generation;
            (session, state.tenant_requests.issue(generation))
        };

        let result = self.inner.directory.fetch(&session).await;
        self.inner.commit_tenants(ticket, result)
    }

    /// Make `startup_id` the current startup and persist the choice.
    ///
    /// Unknown ids are rejected and nothing changes.
    pub fn select_startup(&self, startup_id: &str) -> Result<Startup> {
        let state = self.inner.lock_state();
        let startup = self.inner.directory.select(startup_id)?;
        self.inner.publish(&state);
        Ok(startup)
    }

    /// Create a startup and reload the directory.
    ///
    /// Input is validated first; invalid input never reaches the backend. When
    /// the new startup is the only one it becomes current.
    #[instrument(skip_all, fields(name = %new.name))]
    pub async fn create_startup(&self, new: NewStartup) -> Result<Startup> {
        let new = new.normalized();
        new.validate()?;

        let session = self
            .inner
            .lock_state()
            .session
            .clone()
            .ok_or(TenantError::NoSession)?;

        let created = self
            .inner
            .api
            .create_startup(&session.access_token, &new)
            .await?;
        info!(startup_id = %created.id, "Startup created");

        if let Err(e) = self.refresh_startups().await {
            warn!(
                target: "tenants.refresh_failed",
                error = %e,
                "Startup created but directory reload failed"
            );
        }
        Ok(created)
    }

    /// Sign out and clear all user state, including the persisted selection.
    ///
    /// Provider failures are logged; local state is cleared regardless.
    #[instrument(skip_all)]
    pub async fn sign_out(&self) {
        {
            let mut state = self.inner.lock_state();
            state.phase = AuthState::SigningOut;
            self.inner.publish(&state);
        }

        self.inner
            .sessions
            .sign_out(self.inner.provider.as_ref())
            .await;

        // The store does not notify when no session existed
        let mut state = self.inner.lock_state();
        self.inner.clear_session_state(&mut state, true);
    }
}

impl std::fmt::Debug for AuthOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.snapshot();
        f.debug_struct("AuthOrchestrator")
            .field("state", &snapshot.state)
            .field("startups", &snapshot.startups.len())
            .finish()
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, OrchestratorState> {
        lock(&self.state)
    }

    /// Publish the snapshot for `state`. Called with the state lock held so
    /// snapshots go out in commit order.
    fn publish(&self, state: &OrchestratorState) {
        let view = self.directory.view();
        let permissions = view
            .current
            .as_ref()
            .map(|s| s.user_role.permissions())
            .unwrap_or_else(PermissionSet::none);

        self.snapshots.send_replace(AuthSnapshot {
            state: state.phase,
            user: state.session.as_ref().map(|s| s.user.clone()),
            profile: state.profile.clone(),
            session: state.session.clone(),
            loading: state.phase.is_loading(),
            tenants_loaded: state.tenants_loaded,
            current_startup: view.current,
            startups: view.startups,
            permissions,
        });
    }

    fn on_session_changed(self: &Arc<Self>, session: Option<Session>) {
        let mut state = self.lock_state();
        match session {
            None => {
                let had_session = state.session.is_some();
                self.clear_session_state(&mut state, had_session);
            }
            Some(session) => self.begin_session(&mut state, session),
        }
    }

    fn clear_session_state(&self, state: &mut OrchestratorState, forget_selection: bool) {
        state.generation += 1;
        state.session = None;
        state.profile = None;
        state.tenants_loaded = false;
        state.phase = AuthState::Unauthenticated;

        if forget_selection {
            self.directory.clear();
        } else {
            self.directory.reset();
        }

        debug!(generation = state.generation, "Session cleared");
        self.publish(state);
    }

    fn begin_session(self: &Arc<Self>, state: &mut OrchestratorState, session: Session) {
        let previous_user = state.session.as_ref().map(|s| s.user_id().to_string());
        let same_user = previous_user.as_deref() == Some(session.user_id());

        if previous_user.is_some() && !same_user {
            // Nothing from the previous user may leak into the new session
            info!(user_id = %session.user_id(), "Session switched to a different user");
            state.profile = None;
            self.directory.clear();
        }

        state.generation += 1;
        state.session = Some(session.clone());

        // A token refresh for a settled user reloads quietly
        if !(same_user && state.phase == AuthState::Ready) {
            state.phase = AuthState::Authenticating;
            state.tenants_loaded = false;
        }

        let generation = state.generation;
        let profile_ticket = state.profile_requests.issue(generation);
        let tenant_ticket = state.tenant_requests.issue(generation);
        debug!(generation, user_id = %session.user_id(), "Loading session context");
        self.publish(state);

        let inner = Arc::clone(self);
        self.spawn(async move {
            inner.load(session, profile_ticket, tenant_ticket).await;
        });
    }

    fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = lock(&self.runtime)
            .clone()
            .or_else(|| Handle::try_current().ok());
        match handle {
            Some(handle) => {
                handle.spawn(task);
            }
            None => {
                error!("No tokio runtime available, session context not loaded");
            }
        }
    }

    async fn load(&self, session: Session, profile_ticket: RequestTicket, tenant_ticket: RequestTicket) {
        let profile = async {
            let profile = self.profiles.resolve(&session).await;
            self.commit_profile(profile_ticket, profile);
        };
        let tenants = async {
            let result = self.directory.fetch(&session).await;
            // Failure is already recorded in the snapshot
            let _ = self.commit_tenants(tenant_ticket, result);
        };
        tokio::join!(profile, tenants);

        self.settle(profile_ticket.generation);
    }

    fn commit_profile(&self, ticket: RequestTicket, profile: Option<Profile>) {
        let mut state = self.lock_state();
        if !state.profile_requests.admits(ticket, state.generation) {
            debug!(generation = ticket.generation, "Discarding superseded profile result");
            return;
        }

        // A failed reload keeps what we had for the same user
        if profile.is_some() {
            state.profile = profile;
            self.publish(&state);
        }
    }

    fn commit_tenants(
        &self,
        ticket: RequestTicket,
        result: ApiResult<Vec<Startup>>,
    ) -> Result<Option<Startup>> {
        let mut state = self.lock_state();
        if ticket.generation != state.generation {
            debug!(
                generation = ticket.generation,
                "Discarding startup list for a previous session"
            );
            return Err(TenantError::SessionChanged);
        }
        if !state.tenant_requests.admits(ticket, state.generation) {
            // A newer reload for the same session owns the directory
            debug!(generation = ticket.generation, "Discarding superseded startup list");
            return Ok(self.directory.current());
        }

        let outcome = match result {
            Ok(startups) => Ok(self.directory.apply(startups)),
            Err(e) => {
                warn!(
                    target: "tenants.refresh_failed",
                    error = %e,
                    "Failed to fetch startups, keeping previous directory"
                );
                Err(e.into())
            }
        };

        state.tenants_loaded = true;
        self.publish(&state);
        outcome
    }

    fn settle(&self, generation: u64) {
        let mut state = self.lock_state();
        if state.generation != generation || state.phase != AuthState::Authenticating {
            return;
        }

        state.phase = AuthState::Ready;
        info!(
            user_id = state.session.as_ref().map(Session::user_id).unwrap_or("-"),
            "Session ready"
        );
        self.publish(&state);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Builder for [`AuthOrchestrator`].
pub struct AuthOrchestratorBuilder {
    provider: Arc<dyn IdentityProvider>,
    api: Arc<dyn WorkspaceApi>,
    storage: Option<Arc<dyn KeyValueStore>>,
    sessions: Option<SessionStore>,
    selection_key: String,
}

impl AuthOrchestratorBuilder {
    pub fn new(provider: Arc<dyn IdentityProvider>, api: Arc<dyn WorkspaceApi>) -> Self {
        Self {
            provider,
            api,
            storage: None,
            sessions: None,
            selection_key: DEFAULT_SELECTION_KEY.to_string(),
        }
    }

    /// Where the selected startup id is persisted. Defaults to memory.
    #[must_use]
    pub fn storage(mut self, storage: Arc<dyn KeyValueStore>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Share an existing session store (e.g. one the provider glue already
    /// feeds).
    #[must_use]
    pub fn session_store(mut self, sessions: SessionStore) -> Self {
        self.sessions = Some(sessions);
        self
    }

    #[must_use]
    pub fn selection_key(mut self, key: impl Into<String>) -> Self {
        self.selection_key = key.into();
        self
    }

    pub fn build(self) -> AuthOrchestrator {
        let storage = self
            .storage
            .unwrap_or_else(|| Arc::new(InMemoryKeyValueStore::new()));
        let (snapshots, _) = watch::channel(AuthSnapshot::initial());

        AuthOrchestrator {
            inner: Arc::new(Inner {
                profiles: ProfileResolver::new(Arc::clone(&self.api)),
                directory: TenantDirectory::with_selection_key(
                    Arc::clone(&self.api),
                    storage,
                    self.selection_key,
                ),
                provider: self.provider,
                api: self.api,
                sessions: self.sessions.unwrap_or_default(),
                state: Mutex::new(OrchestratorState::default()),
                snapshots,
                listener: Mutex::new(None),
                runtime: Mutex::new(None),
            }),
        }
    }
}

//! Last-known identity-provider session with change notification.

use super::types::Session;
use crate::traits::identity::IdentityProvider;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};
use tracing::{debug, info, instrument, warn};

type Listener = Arc<dyn Fn(Option<&Session>) + Send + Sync>;

struct SessionStoreInner {
    current: RwLock<Option<Session>>,
    initialized: AtomicBool,
    listeners: Mutex<Vec<(u64, Listener)>>,
    next_listener_id: AtomicU64,
}

/// Holds the current identity-provider session.
///
/// Reads are synchronous. Every transition (including the initial startup
/// resolution) is pushed to registered listeners, in registration order,
/// before the mutating call returns. Cloning shares the same state.
///
/// # Example
///
/// ```rust
/// use tenantry::session::{Session, SessionStore, UserIdentity};
///
/// let store = SessionStore::new();
/// let handle = store.on_session_change(|session| {
///     println!("signed in: {}", session.is_some());
/// });
///
/// store.set_session(Some(Session::new("token", UserIdentity::new("user_1"))));
/// assert!(store.current().is_some());
///
/// handle.unsubscribe();
/// ```
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<SessionStoreInner>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    /// Create an empty, uninitialized store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SessionStoreInner {
                current: RwLock::new(None),
                initialized: AtomicBool::new(false),
                listeners: Mutex::new(Vec::new()),
                next_listener_id: AtomicU64::new(1),
            }),
        }
    }

    /// Last known session.
    pub fn current(&self) -> Option<Session> {
        self.inner
            .current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether the startup session check has resolved.
    pub fn is_initialized(&self) -> bool {
        self.inner.initialized.load(Ordering::Acquire)
    }

    /// Register a listener called with the new value on every transition.
    ///
    /// The listener stays registered until the returned handle is
    /// unsubscribed or dropped.
    pub fn on_session_change<F>(&self, listener: F) -> ListenerHandle
    where
        F: Fn(Option<&Session>) + Send + Sync + 'static,
    {
        let id = self.inner.next_listener_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(listener)));

        ListenerHandle {
            id,
            store: Arc::downgrade(&self.inner),
        }
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Resolve the startup session from the provider.
    ///
    /// A provider failure is logged and resolves to no session. Listeners
    /// are always notified, so consumers leave their loading state.
    #[instrument(skip_all)]
    pub async fn initialize(&self, provider: &dyn IdentityProvider) -> Option<Session> {
        let session = match provider.get_session().await {
            Ok(session) => session,
            Err(e) => {
                warn!(
                    target: "session.init_failed",
                    error = %e,
                    "Startup session check failed, treating as signed out"
                );
                None
            }
        };

        debug!(signed_in = session.is_some(), "Startup session check resolved");
        self.replace(session.clone(), true);
        session
    }

    /// Replace the session with a value reported by the provider (sign-in,
    /// token refresh, external sign-out).
    ///
    /// Absent-to-absent after initialization is not a transition and does not
    /// notify.
    pub fn set_session(&self, session: Option<Session>) {
        self.replace(session, false);
    }

    /// Sign out with the provider, then clear the session and notify
    /// listeners before returning.
    ///
    /// A provider failure is logged; the local session is cleared regardless.
    #[instrument(skip_all)]
    pub async fn sign_out(&self, provider: &dyn IdentityProvider) {
        if let Err(e) = provider.sign_out().await {
            warn!(
                target: "session.sign_out_failed",
                error = %e,
                "Provider sign-out failed, clearing local session anyway"
            );
        }
        self.replace(None, false);
        info!("Signed out");
    }

    fn replace(&self, session: Option<Session>, force_notify: bool) {
        let was_initialized = self.inner.initialized.swap(true, Ordering::AcqRel);
        let previous = {
            let mut current = self
                .inner
                .current
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *current, session.clone())
        };

        if !force_notify && was_initialized && previous.is_none() && session.is_none() {
            return;
        }

        self.notify(session.as_ref());
    }

    fn notify(&self, session: Option<&Session>) {
        // Snapshot so listeners may read the store or (un)register freely
        let listeners: Vec<Listener> = self
            .inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in listeners {
            listener(session);
        }
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("signed_in", &self.current().is_some())
            .field("initialized", &self.is_initialized())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Registration handle returned by [`SessionStore::on_session_change`].
///
/// Dropping the handle unsubscribes the listener.
#[must_use = "dropping the handle unsubscribes the listener immediately"]
pub struct ListenerHandle {
    id: u64,
    store: Weak<SessionStoreInner>,
}

impl ListenerHandle {
    /// Remove the listener.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        if let Some(store) = self.store.upgrade() {
            store
                .listeners
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .retain(|(id, _)| *id != self.id);
        }
    }
}

impl std::fmt::Debug for ListenerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerHandle").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::UserIdentity;
    use crate::testing::StaticIdentityProvider;

    fn session(token: &str, user: &str) -> Session {
        Session::new(token, UserIdentity::new(user))
    }

    fn recorder(store: &SessionStore) -> (ListenerHandle, Arc<Mutex<Vec<Option<String>>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let handle = store.on_session_change(move |s| {
            sink.lock().unwrap().push(s.map(|s| s.user_id().to_string()));
        });
        (handle, seen)
    }

    #[tokio::test]
    async fn test_initialize_notifies_even_when_absent() {
        let store = SessionStore::new();
        let (_handle, seen) = recorder(&store);
        let provider = StaticIdentityProvider::signed_out();

        assert!(!store.is_initialized());
        let resolved = store.initialize(&provider).await;

        assert!(resolved.is_none());
        assert!(store.is_initialized());
        assert_eq!(*seen.lock().unwrap(), vec![None]);
    }

    #[tokio::test]
    async fn test_initialize_failure_resolves_absent() {
        let store = SessionStore::new();
        let (_handle, seen) = recorder(&store);
        let provider = StaticIdentityProvider::signed_in(session("t", "u1"));
        provider.fail_get_session(true);

        assert!(store.initialize(&provider).await.is_none());
        assert!(store.current().is_none());
        assert_eq!(*seen.lock().unwrap(), vec![None]);
    }

    #[tokio::test]
    async fn test_initialize_with_session() {
        let store = SessionStore::new();
        let (_handle, seen) = recorder(&store);
        let provider = StaticIdentityProvider::signed_in(session("t", "u1"));

        store.initialize(&provider).await;

        assert_eq!(store.current().unwrap().user_id(), "u1");
        assert_eq!(*seen.lock().unwrap(), vec![Some("u1".to_string())]);
    }

    #[test]
    fn test_every_transition_notifies() {
        let store = SessionStore::new();
        let (_handle, seen) = recorder(&store);

        store.set_session(Some(session("t1", "u1")));
        store.set_session(Some(session("t2", "u1"))); // token refresh
        store.set_session(None);
        store.set_session(None); // not a transition

        assert_eq!(
            *seen.lock().unwrap(),
            vec![Some("u1".to_string()), Some("u1".to_string()), None]
        );
    }

    #[tokio::test]
    async fn test_sign_out_clears_before_returning() {
        let store = SessionStore::new();
        let provider = StaticIdentityProvider::signed_in(session("t", "u1"));
        store.initialize(&provider).await;
        let (_handle, seen) = recorder(&store);

        provider.fail_sign_out(true);
        store.sign_out(&provider).await;

        assert!(store.current().is_none());
        assert_eq!(*seen.lock().unwrap(), vec![None]);
    }

    #[test]
    fn test_unsubscribe_and_drop() {
        let store = SessionStore::new();
        let (handle, seen) = recorder(&store);
        assert_eq!(store.listener_count(), 1);

        handle.unsubscribe();
        assert_eq!(store.listener_count(), 0);

        store.set_session(Some(session("t", "u1")));
        assert!(seen.lock().unwrap().is_empty());

        {
            let _scoped = store.on_session_change(|_| {});
            assert_eq!(store.listener_count(), 1);
        }
        assert_eq!(store.listener_count(), 0);
    }

    #[test]
    fn test_listener_can_read_store() {
        let store = SessionStore::new();
        let reader = store.clone();
        let observed = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&observed);
        let _handle = store.on_session_change(move |_| {
            *sink.lock().unwrap() = reader.current().map(|s| s.user_id().to_string());
        });

        store.set_session(Some(session("t", "u9")));
        assert_eq!(observed.lock().unwrap().as_deref(), Some("u9"));
    }
}

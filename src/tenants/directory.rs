//! Startup directory and current-startup selection.
//!
//! The directory is replaced wholesale on every refresh. Selection follows a
//! fixed policy (see [`choose_current`]) and the explicit choice is persisted
//! in the injected [`KeyValueStore`] so it survives reloads.

use super::error::{Result, TenantError};
use super::types::Startup;
use crate::error::Result as ApiResult;
use crate::session::Session;
use crate::traits::storage::KeyValueStore;
use crate::traits::workspace::WorkspaceApi;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, instrument, warn};

/// Default storage key for the last selected startup id.
pub const DEFAULT_SELECTION_KEY: &str = "currentStartupId";

/// Consistent view of the directory at one instant.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DirectoryView {
    /// Startups in server order.
    pub startups: Vec<Startup>,
    /// The selected startup; always an element of `startups`.
    pub current: Option<Startup>,
}

#[derive(Debug, Default)]
struct DirectoryState {
    startups: Vec<Startup>,
    current_id: Option<String>,
}

impl DirectoryState {
    fn current(&self) -> Option<&Startup> {
        let id = self.current_id.as_deref()?;
        self.startups.iter().find(|s| s.id == id)
    }
}

/// Pick the current startup for a freshly fetched list.
///
/// In order: keep `current` if it is still listed, else the persisted id if
/// listed, else the first startup. An empty list selects nothing.
pub fn choose_current<'a>(
    startups: &'a [Startup],
    current: Option<&str>,
    persisted: Option<&str>,
) -> Option<&'a Startup> {
    let find = |id: &str| startups.iter().find(|s| s.id == id);

    current
        .and_then(find)
        .or_else(|| persisted.and_then(find))
        .or_else(|| startups.first())
}

/// The user's startups plus the current selection.
pub struct TenantDirectory {
    api: Arc<dyn WorkspaceApi>,
    storage: Arc<dyn KeyValueStore>,
    selection_key: String,
    state: Mutex<DirectoryState>,
}

impl TenantDirectory {
    /// Create an empty directory using the default selection key.
    pub fn new(api: Arc<dyn WorkspaceApi>, storage: Arc<dyn KeyValueStore>) -> Self {
        Self::with_selection_key(api, storage, DEFAULT_SELECTION_KEY)
    }

    pub fn with_selection_key(
        api: Arc<dyn WorkspaceApi>,
        storage: Arc<dyn KeyValueStore>,
        selection_key: impl Into<String>,
    ) -> Self {
        Self {
            api,
            storage,
            selection_key: selection_key.into(),
            state: Mutex::new(DirectoryState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, DirectoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Startups in server order.
    pub fn startups(&self) -> Vec<Startup> {
        self.lock().startups.clone()
    }

    /// The selected startup.
    pub fn current(&self) -> Option<Startup> {
        self.lock().current().cloned()
    }

    /// Startups and selection read under one lock.
    pub fn view(&self) -> DirectoryView {
        let state = self.lock();
        DirectoryView {
            startups: state.startups.clone(),
            current: state.current().cloned(),
        }
    }

    /// Persisted last-selected startup id.
    pub fn persisted_selection(&self) -> Option<String> {
        self.storage.get(&self.selection_key)
    }

    /// Fetch the startup list for `session` without touching the directory.
    pub async fn fetch(&self, session: &Session) -> ApiResult<Vec<Startup>> {
        self.api.list_startups(&session.access_token).await
    }

    /// Replace the directory with `startups` and re-run the selection policy.
    ///
    /// An empty list clears the selection but leaves the persisted id alone,
    /// so it can be honored once startups reappear.
    pub fn apply(&self, startups: Vec<Startup>) -> Option<Startup> {
        let persisted = self.persisted_selection();
        let mut state = self.lock();

        let chosen = choose_current(&startups, state.current_id.as_deref(), persisted.as_deref())
            .map(|s| s.id.clone());

        debug!(
            count = startups.len(),
            current = chosen.as_deref().unwrap_or("-"),
            "Startup directory replaced"
        );

        state.startups = startups;
        state.current_id = chosen;
        state.current().cloned()
    }

    /// Fetch and apply. On failure the existing directory is kept.
    #[instrument(skip_all, fields(user_id = %session.user_id()))]
    pub async fn refresh(&self, session: &Session) -> ApiResult<Option<Startup>> {
        match self.fetch(session).await {
            Ok(startups) => Ok(self.apply(startups)),
            Err(e) => {
                warn!(
                    target: "tenants.refresh_failed",
                    error = %e,
                    "Failed to fetch startups, keeping previous directory"
                );
                Err(e)
            }
        }
    }

    /// Make `startup_id` the current startup and persist it.
    ///
    /// Ids that are not in the directory are rejected and nothing changes.
    pub fn select(&self, startup_id: &str) -> Result<Startup> {
        let selected = {
            let mut state = self.lock();
            let startup = state
                .startups
                .iter()
                .find(|s| s.id == startup_id)
                .cloned()
                .ok_or_else(|| TenantError::unknown_startup(startup_id))?;
            state.current_id = Some(startup.id.clone());
            startup
        };

        if let Err(e) = self.storage.set(&self.selection_key, &selected.id) {
            warn!(
                target: "tenants.persist_failed",
                error = %e,
                "Failed to persist startup selection"
            );
        }

        info!(startup_id = %selected.id, "Startup selected");
        Ok(selected)
    }

    /// Empty the directory without touching the persisted selection.
    pub fn reset(&self) {
        *self.lock() = DirectoryState::default();
    }

    /// Empty the directory and forget the persisted selection (sign-out).
    pub fn clear(&self) {
        self.reset();
        if let Err(e) = self.storage.remove(&self.selection_key) {
            warn!(
                target: "tenants.persist_failed",
                error = %e,
                "Failed to clear persisted startup selection"
            );
        }
    }
}

impl std::fmt::Debug for TenantDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("TenantDirectory")
            .field("startups", &state.startups.len())
            .field("current", &state.current_id)
            .field("selection_key", &self.selection_key)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryKeyValueStore;
    use crate::tenants::StartupRole;
    use crate::testing::InMemoryWorkspaceApi;

    fn startup(id: &str) -> Startup {
        Startup::new(id, format!("Startup {}", id), StartupRole::Member)
    }

    fn abc() -> Vec<Startup> {
        vec![startup("A"), startup("B"), startup("C")]
    }

    fn directory() -> (TenantDirectory, InMemoryWorkspaceApi, InMemoryKeyValueStore) {
        let api = InMemoryWorkspaceApi::new();
        let storage = InMemoryKeyValueStore::new();
        let dir = TenantDirectory::new(Arc::new(api.clone()), Arc::new(storage.clone()));
        (dir, api, storage)
    }

    #[test]
    fn test_policy_prefers_persisted_over_first() {
        let list = abc();
        assert_eq!(choose_current(&list, None, Some("C")).unwrap().id, "C");
    }

    #[test]
    fn test_policy_falls_back_to_first() {
        let list = abc();
        assert_eq!(choose_current(&list, None, Some("Z")).unwrap().id, "A");
        assert_eq!(choose_current(&list, None, None).unwrap().id, "A");
    }

    #[test]
    fn test_policy_keeps_current() {
        let list = abc();
        assert_eq!(choose_current(&list, Some("B"), Some("C")).unwrap().id, "B");
        // Current no longer listed: persisted wins
        assert_eq!(choose_current(&list, Some("Q"), Some("C")).unwrap().id, "C");
    }

    #[test]
    fn test_policy_empty() {
        assert!(choose_current(&[], Some("A"), Some("A")).is_none());
    }

    #[test]
    fn test_apply_uses_persisted_selection() {
        let (dir, _api, storage) = directory();
        storage.set(DEFAULT_SELECTION_KEY, "C").unwrap();

        assert_eq!(dir.apply(abc()).unwrap().id, "C");
        assert_eq!(dir.view().current.unwrap().id, "C");
    }

    #[test]
    fn test_apply_keeps_current_across_refresh() {
        let (dir, _api, _storage) = directory();
        dir.apply(abc());
        dir.select("B").unwrap();

        assert_eq!(dir.apply(abc()).unwrap().id, "B");
    }

    #[test]
    fn test_empty_refresh_clears_current_but_keeps_persisted() {
        let (dir, _api, _storage) = directory();
        dir.apply(abc());
        dir.select("C").unwrap();

        assert!(dir.apply(Vec::new()).is_none());
        assert!(dir.current().is_none());
        assert_eq!(dir.persisted_selection().as_deref(), Some("C"));

        // Startups reappear: persisted choice is honored again
        assert_eq!(dir.apply(abc()).unwrap().id, "C");
    }

    #[test]
    fn test_select_persists_and_rejects_unknown() {
        let (dir, _api, storage) = directory();
        dir.apply(abc());

        dir.select("B").unwrap();
        assert_eq!(storage.get(DEFAULT_SELECTION_KEY).as_deref(), Some("B"));

        let err = dir.select("Z").unwrap_err();
        assert!(matches!(err, TenantError::UnknownStartup { .. }));
        assert_eq!(dir.current().unwrap().id, "B");
        assert_eq!(storage.get(DEFAULT_SELECTION_KEY).as_deref(), Some("B"));
    }

    #[test]
    fn test_clear_forgets_persisted_selection() {
        let (dir, _api, storage) = directory();
        dir.apply(abc());
        dir.select("B").unwrap();

        dir.clear();
        assert!(dir.startups().is_empty());
        assert!(dir.current().is_none());
        assert_eq!(storage.get(DEFAULT_SELECTION_KEY), None);
    }

    #[tokio::test]
    async fn test_refresh_failure_keeps_directory() {
        let (dir, api, _storage) = directory();
        let session = api.sign_in("user_1", "ada@example.com");
        api.add_startup("user_1", startup("A"));

        dir.refresh(&session).await.unwrap();
        assert_eq!(dir.startups().len(), 1);

        api.set_offline(true);
        assert!(dir.refresh(&session).await.is_err());
        assert_eq!(dir.startups().len(), 1);
        assert_eq!(dir.current().unwrap().id, "A");
    }
}

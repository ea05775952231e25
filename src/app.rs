use crate::auth::{AuthOrchestrator, CallbackHandler};
use crate::client::HttpWorkspaceApi;
use crate::config::Config;
use crate::invites::InviteManager;
use crate::storage::{FileKeyValueStore, InMemoryKeyValueStore};
use crate::traits::identity::IdentityProvider;
use crate::traits::storage::KeyValueStore;
use crate::traits::workspace::WorkspaceApi;
use std::sync::Arc;

/// Application context for dependency injection and shared state
///
/// Owns the auth orchestrator plus the collaborators that act on its
/// snapshot. Create one at startup and pass clones to consumers; there is no
/// global instance.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub auth: AuthOrchestrator,
    pub invites: Arc<InviteManager>,
    pub callback: Arc<CallbackHandler>,
}

impl AppContext {
    /// Builder pattern for constructing AppContext
    pub fn builder(provider: Arc<dyn IdentityProvider>) -> AppContextBuilder {
        AppContextBuilder::new(provider)
    }

    /// Build with the HTTP backend and the storage described by `config`.
    pub fn from_config(config: Config, provider: Arc<dyn IdentityProvider>) -> Self {
        Self::builder(provider).with_config(config).build()
    }
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("api", &self.config.api.base_url)
            .field("auth", &self.auth)
            .finish()
    }
}

/// Builder for AppContext
pub struct AppContextBuilder {
    config: Config,
    provider: Arc<dyn IdentityProvider>,
    api: Option<Arc<dyn WorkspaceApi>>,
    storage: Option<Arc<dyn KeyValueStore>>,
}

impl AppContextBuilder {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self {
            config: Config::default(),
            provider,
            api: None,
            storage: None,
        }
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Use a specific backend instead of [`HttpWorkspaceApi`].
    pub fn with_workspace_api(mut self, api: Arc<dyn WorkspaceApi>) -> Self {
        self.api = Some(api);
        self
    }

    /// Use a specific key-value store instead of the configured one.
    pub fn with_storage(mut self, storage: Arc<dyn KeyValueStore>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn build(self) -> AppContext {
        let config = self.config;
        let api = self
            .api
            .unwrap_or_else(|| Arc::new(HttpWorkspaceApi::from_config(&config.api)));
        let storage: Arc<dyn KeyValueStore> = match (self.storage, &config.storage.path) {
            (Some(storage), _) => storage,
            (None, Some(path)) => Arc::new(FileKeyValueStore::open(path)),
            (None, None) => Arc::new(InMemoryKeyValueStore::new()),
        };

        let auth = AuthOrchestrator::builder(Arc::clone(&self.provider), Arc::clone(&api))
            .storage(storage)
            .selection_key(config.storage.selection_key.clone())
            .build();
        let callback = CallbackHandler::new(
            self.provider,
            auth.session_store().clone(),
            config.callback.clone(),
        );

        let invites = Arc::new(InviteManager::new(api));
        invites.follow_sessions(auth.session_store());

        AppContext {
            invites,
            callback: Arc::new(callback),
            auth,
            config: Arc::new(config),
        }
    }
}

//! Tenantry - client-side session and tenant synchronization
//!
//! Tenantry keeps a multi-tenant ("startup") workspace client in sync with
//! its identity provider: it reconciles the provider session with the
//! application profile and the user's startup memberships, derives
//! role-based UI permissions, and manages a startup's invite code and team.
//!
//! # Features
//!
//! - **Auth orchestration**: a race-free state machine publishing one
//!   consistent snapshot through a `tokio::sync::watch` channel
//! - **Tenants**: startup directory with a persisted current selection
//! - **Permissions**: advisory capability flags derived from roles
//! - **Invites**: invite code rotation and member removal
//! - **Callback**: completes sign-in after the provider redirect
//! - **Testing**: in-memory fakes behind the `test-helpers` feature
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tenantry::{AppContext, ConfigBuilder};
//!
//! #[tokio::main]
//! async fn main() -> tenantry::Result<()> {
//!     let config = ConfigBuilder::new().from_env().build()?;
//!     tenantry::init_tracing_with_config(&config);
//!
//!     // `provider` wraps your identity provider SDK
//!     let app = AppContext::from_config(config, Arc::new(provider));
//!     app.auth.start().await;
//!
//!     let snapshot = app.auth.wait_until_settled().await;
//!     println!("current startup: {:?}", snapshot.current_startup);
//!     Ok(())
//! }
//! ```

mod app;
pub mod auth;
pub mod client;
mod config;
mod error;
pub mod invites;
pub mod profile;
pub mod session;
pub mod storage;
pub mod tenants;
#[cfg(any(test, feature = "test-helpers"))]
pub mod testing;
pub mod traits;
pub mod utils;

// Re-exports for public API
pub use app::{AppContext, AppContextBuilder};
pub use auth::{AuthOrchestrator, AuthSnapshot, AuthState, CallbackHandler, CallbackOutcome};
pub use config::{ApiConfig, CallbackConfig, Config, ConfigBuilder, LoggingConfig, StorageConfig};
pub use error::{Result, TenantryError};
pub use invites::{InviteCode, InviteManager};
pub use tenants::{PermissionSet, Startup, StartupRole, TenantError};
pub use traits::{IdentityProvider, KeyValueStore, WorkspaceApi};

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging with sensible defaults
///
/// # Environment Variables
///
/// - `RUST_LOG`: Set log level (e.g., "info", "debug", "tenantry=debug")
/// - `TENANTRY_LOG_JSON`: Set to "true" for JSON formatted logs
///
/// Safe to call more than once; later calls leave the first subscriber in
/// place.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json_logs = std::env::var("TENANTRY_LOG_JSON")
        .map(|v| v.parse::<bool>().unwrap_or(false))
        .unwrap_or(false);

    install(env_filter, json_logs);
}

/// Initialize tracing with a custom configuration
pub fn init_tracing_with_config(config: &Config) {
    install(EnvFilter::new(&config.logging.level), config.logging.json);
}

fn install(env_filter: EnvFilter, json: bool) {
    let result = if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
    };

    if result.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}

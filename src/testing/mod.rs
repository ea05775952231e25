//! In-memory fakes for testing code built on tenantry.
//!
//! Available in this crate's tests and, with the `test-helpers` feature,
//! to downstream crates.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tenantry::auth::AuthOrchestrator;
//! use tenantry::testing::{InMemoryKeyValueStore, InMemoryWorkspaceApi, StaticIdentityProvider};
//!
//! #[tokio::test]
//! async fn test_dashboard_sees_startups() {
//!     let api = InMemoryWorkspaceApi::new();
//!     let session = api.sign_in("user_1", "ada@example.com");
//!     let provider = StaticIdentityProvider::signed_in(session);
//!
//!     let auth = AuthOrchestrator::new(
//!         Arc::new(provider),
//!         Arc::new(api),
//!         Arc::new(InMemoryKeyValueStore::new()),
//!     );
//!     auth.start().await;
//!     let snapshot = auth.wait_until_settled().await;
//!     assert!(snapshot.tenants_loaded);
//! }
//! ```

mod identity;
mod workspace;

pub use crate::storage::InMemoryKeyValueStore;
pub use identity::StaticIdentityProvider;
pub use workspace::InMemoryWorkspaceApi;

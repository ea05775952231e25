//! Core traits for swappable collaborators.
//!
//! The identity provider, the workspace backend and durable client storage
//! sit behind these traits so implementations can be swapped (HTTP clients
//! in production, in-memory fakes in tests).

pub mod identity;
pub mod storage;
pub mod workspace;

pub use identity::IdentityProvider;
pub use storage::KeyValueStore;
pub use workspace::WorkspaceApi;

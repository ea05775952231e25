//! Identity-provider session state.
//!
//! [`SessionStore`] holds the last known [`Session`] and notifies listeners
//! on every transition. The provider itself stays behind
//! [`IdentityProvider`](crate::traits::IdentityProvider).

mod store;
mod types;

pub use store::{ListenerHandle, SessionStore};
pub use types::{AccessToken, Session, UserIdentity};

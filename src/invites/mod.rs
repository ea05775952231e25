//! Invite codes and team membership.

mod manager;
mod types;

pub use manager::{InviteManager, REGENERATE_FAILED, REMOVE_FAILED};
pub use types::InviteCode;

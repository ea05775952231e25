//! Startups (tenants), roles and permissions.
//!
//! - [`TenantDirectory`] - the user's startups and the current selection
//! - [`PermissionSet`] - UI capability flags derived from a role
//! - [`NewStartup`] - validated onboarding input
//!
//! Permissions are advisory. The backend re-checks every privileged call.

mod directory;
mod error;
pub mod permissions;
mod types;

pub use directory::{DEFAULT_SELECTION_KEY, DirectoryView, TenantDirectory, choose_current};
pub use error::{Result, TenantError};
pub use permissions::PermissionSet;
pub use types::{Industry, Member, NewStartup, ParseRoleError, Stage, Startup, StartupRole};

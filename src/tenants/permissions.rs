//! Role to capability mapping.
//!
//! These flags gate UI actions only. The backend re-validates every
//! privileged request; nothing here is a security boundary.

use super::types::StartupRole;
use serde::{Deserialize, Serialize};

/// Capability flags derived from the caller's role in the current startup.
///
/// | role    | content | analytics | pitch | team | startup |
/// |---------|---------|-----------|-------|------|---------|
/// | founder | yes     | yes       | yes   | yes  | yes     |
/// | manager | yes     | yes       | no    | no   | no      |
/// | member  | no      | no        | no    | no   | no      |
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PermissionSet {
    pub can_manage_content: bool,
    pub can_view_analytics: bool,
    pub can_access_pitch: bool,
    pub can_manage_team: bool,
    pub can_manage_startup: bool,
}

impl PermissionSet {
    /// Permissions for a role.
    #[must_use]
    pub const fn for_role(role: StartupRole) -> Self {
        match role {
            StartupRole::Founder => Self {
                can_manage_content: true,
                can_view_analytics: true,
                can_access_pitch: true,
                can_manage_team: true,
                can_manage_startup: true,
            },
            StartupRole::Manager => Self {
                can_manage_content: true,
                can_view_analytics: true,
                can_access_pitch: false,
                can_manage_team: false,
                can_manage_startup: false,
            },
            StartupRole::Member => Self::none(),
        }
    }

    /// No capabilities at all.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            can_manage_content: false,
            can_view_analytics: false,
            can_access_pitch: false,
            can_manage_team: false,
            can_manage_startup: false,
        }
    }
}

/// Derive permissions from a raw role string.
///
/// Unrecognized roles get the member row.
#[must_use]
pub fn derive(role: &str) -> PermissionSet {
    PermissionSet::for_role(StartupRole::parse_lossy(role))
}

impl StartupRole {
    #[must_use]
    pub fn permissions(&self) -> PermissionSet {
        PermissionSet::for_role(*self)
    }
}

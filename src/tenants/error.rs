//! Startup and team error types.

use std::collections::HashMap;
use thiserror::Error;

use crate::error::TenantryError;

/// Errors from user-initiated startup, team and invite actions.
#[derive(Debug, Error)]
pub enum TenantError {
    /// No session is established.
    #[error("Not signed in")]
    NoSession,

    /// The session changed while the request was in flight; its result was
    /// dropped.
    #[error("Session changed before the request completed")]
    SessionChanged,

    /// The id is not in the current startup directory.
    #[error("Startup not found in directory: {startup_id}")]
    UnknownStartup {
        /// The requested id.
        startup_id: String,
    },

    /// The caller's role does not allow the action.
    #[error("Insufficient permissions: requires {required}")]
    InsufficientPermission {
        /// The required capability or role.
        required: String,
    },

    /// Founders cannot be removed from their startup.
    #[error("Cannot remove a founder")]
    CannotRemoveFounder,

    /// Input rejected client-side; no request was sent.
    #[error("Validation failed")]
    Validation {
        /// Messages keyed by field name.
        fields: HashMap<String, Vec<String>>,
    },

    /// Backend or transport error.
    #[error(transparent)]
    Api(#[from] TenantryError),
}

impl TenantError {
    /// Create an unknown startup error.
    pub fn unknown_startup(startup_id: impl Into<String>) -> Self {
        Self::UnknownStartup {
            startup_id: startup_id.into(),
        }
    }

    /// Create an insufficient permission error.
    pub fn insufficient_permission(required: impl Into<String>) -> Self {
        Self::InsufficientPermission {
            required: required.into(),
        }
    }

    /// Message to show the user: the backend's detail when present, else
    /// `fallback`.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            Self::Api(err) => err
                .detail()
                .map(str::to_string)
                .unwrap_or_else(|| fallback.to_string()),
            Self::Validation { fields } => fields
                .values()
                .flatten()
                .next()
                .cloned()
                .unwrap_or_else(|| fallback.to_string()),
            other => other.to_string(),
        }
    }
}

impl From<validator::ValidationErrors> for TenantError {
    fn from(errors: validator::ValidationErrors) -> Self {
        match TenantryError::from(errors) {
            TenantryError::Validation(fields) => Self::Validation { fields },
            other => Self::Api(other),
        }
    }
}

/// Result type for startup and team operations.
pub type Result<T> = std::result::Result<T, TenantError>;

use serde::Deserialize;
use std::collections::HashMap;

/// The main error type for tenantry operations
#[derive(Debug, thiserror::Error)]
pub enum TenantryError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Request timeout")]
    RequestTimeout,

    /// Input rejected before any request was sent.
    #[error("Validation failed")]
    Validation(HashMap<String, Vec<String>>),
}

/// Error body returned by the workspace backend.
///
/// The backend reports failures as `{ "detail": "..." }`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorBody {
    pub detail: Option<String>,
}

impl TenantryError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn service_unavailable(msg: impl Into<String>) -> Self {
        Self::ServiceUnavailable(msg.into())
    }

    pub fn request_timeout() -> Self {
        Self::RequestTimeout
    }

    /// Single-field validation error.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut fields = HashMap::new();
        fields.insert(field.into(), vec![message.into()]);
        Self::Validation(fields)
    }

    /// Build an error from an HTTP status and the backend's `detail`, if any.
    pub fn from_status(status: u16, detail: Option<String>) -> Self {
        let msg = detail.unwrap_or_default();
        match status {
            400 | 422 => Self::BadRequest(msg),
            401 => Self::Unauthorized(msg),
            403 => Self::Forbidden(msg),
            404 => Self::NotFound(msg),
            408 | 504 => Self::RequestTimeout,
            502 | 503 => Self::ServiceUnavailable(msg),
            _ => Self::Internal(if msg.is_empty() {
                format!("Unexpected status {}", status)
            } else {
                msg
            }),
        }
    }

    /// Detail text reported by the backend, when there is one worth showing.
    pub fn detail(&self) -> Option<&str> {
        let msg = match self {
            Self::NotFound(msg)
            | Self::BadRequest(msg)
            | Self::Unauthorized(msg)
            | Self::Forbidden(msg) => msg,
            _ => return None,
        };
        if msg.is_empty() { None } else { Some(msg) }
    }

    /// True for failures that a later refresh may recover from.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ServiceUnavailable(_) | Self::RequestTimeout | Self::Internal(_)
        )
    }

    /// Field errors for validation failures.
    pub fn field_errors(&self) -> Option<&HashMap<String, Vec<String>>> {
        match self {
            Self::Validation(fields) => Some(fields),
            _ => None,
        }
    }
}

impl From<validator::ValidationErrors> for TenantryError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let fields = errors
            .field_errors()
            .into_iter()
            .map(|(field, errs)| {
                let messages = errs
                    .iter()
                    .map(|e| {
                        e.message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| e.code.to_string())
                    })
                    .collect();
                (field.to_string(), messages)
            })
            .collect();
        Self::Validation(fields)
    }
}

/// Result type alias for tenantry operations
pub type Result<T> = std::result::Result<T, TenantryError>;

// Common error type conversions

impl From<serde_json::Error> for TenantryError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_data() || err.is_syntax() || err.is_eof() {
            TenantryError::BadRequest(format!("JSON error: {}", err))
        } else {
            TenantryError::Internal(format!("JSON serialization error: {}", err))
        }
    }
}

impl From<reqwest::Error> for TenantryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TenantryError::RequestTimeout
        } else if err.is_connect() {
            TenantryError::ServiceUnavailable(format!("Connection error: {}", err))
        } else if err.is_status() {
            match err.status() {
                Some(status) => TenantryError::from_status(status.as_u16(), None),
                None => TenantryError::Internal(format!("HTTP error: {}", err)),
            }
        } else if err.is_decode() {
            TenantryError::Internal(format!("Malformed response: {}", err))
        } else {
            TenantryError::Internal(format!("Request error: {}", err))
        }
    }
}

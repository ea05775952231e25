use serde::{Deserialize, Serialize};
use std::fmt;

/// The active join code for a startup.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InviteCode {
    pub startup_id: String,
    pub code: String,
}

impl InviteCode {
    pub fn new(startup_id: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            startup_id: startup_id.into(),
            code: code.into(),
        }
    }
}

impl fmt::Display for InviteCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code)
    }
}

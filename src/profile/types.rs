//! Application profile types.

use serde::{Deserialize, Serialize};

/// Application-level user record, distinct from the provider identity.
///
/// Created lazily by the backend on first successful authentication.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl Profile {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            full_name: None,
            email: None,
            avatar_url: None,
            created_at: None,
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.full_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Name to show for this user: full name, else email, else "User".
    pub fn display_name(&self) -> &str {
        non_blank(self.full_name.as_deref())
            .or_else(|| non_blank(self.email.as_deref()))
            .unwrap_or("User")
    }

    pub fn initials(&self) -> String {
        initials(self.full_name.as_deref(), self.email.as_deref())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Up to two uppercase initials from a name, falling back to the email.
///
/// Returns `"U"` when neither is usable.
pub fn initials(full_name: Option<&str>, email: Option<&str>) -> String {
    let source = non_blank(full_name).or_else(|| non_blank(email)).unwrap_or("U");

    source
        .split_whitespace()
        .filter_map(|word| word.chars().next())
        .flat_map(char::to_uppercase)
        .take(2)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_fallbacks() {
        let profile = Profile::new("p1").with_name("Ada Lovelace").with_email("ada@example.com");
        assert_eq!(profile.display_name(), "Ada Lovelace");

        let profile = Profile::new("p1").with_email("ada@example.com");
        assert_eq!(profile.display_name(), "ada@example.com");

        let profile = Profile::new("p1").with_name("   ");
        assert_eq!(profile.display_name(), "User");
    }

    #[test]
    fn test_initials() {
        assert_eq!(initials(Some("Ada Lovelace"), None), "AL");
        assert_eq!(initials(Some("grace brewster murray hopper"), None), "GB");
        assert_eq!(initials(None, Some("ada@example.com")), "A");
        assert_eq!(initials(None, None), "U");
    }

    #[test]
    fn test_deserialize_ignores_unknown_fields() {
        let profile: Profile = serde_json::from_str(
            r#"{"id": "p1", "full_name": "Ada", "email": "ada@example.com", "plan": "pro"}"#,
        )
        .unwrap();
        assert_eq!(profile.id, "p1");
        assert_eq!(profile.full_name.as_deref(), Some("Ada"));
        assert!(profile.avatar_url.is_none());
    }
}

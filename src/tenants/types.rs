//! Startup (tenant) types.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;
use validator::{Validate, ValidationError};

/// The caller's role inside one startup.
///
/// Scoped to (startup, current user); not a global role. Deserialization is
/// fail-closed: any unrecognized string becomes [`StartupRole::Member`].
///
/// # Example
///
/// ```rust
/// use tenantry::tenants::StartupRole;
///
/// let role: StartupRole = serde_json::from_str("\"founder\"").unwrap();
/// assert_eq!(role, StartupRole::Founder);
///
/// let unknown: StartupRole = serde_json::from_str("\"guest\"").unwrap();
/// assert_eq!(unknown, StartupRole::Member);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "String")]
pub enum StartupRole {
    /// Created the startup; full control.
    Founder,
    /// Manages content and analytics.
    Manager,
    /// Regular member with no management permissions.
    #[default]
    Member,
}

impl StartupRole {
    /// Get the string representation of the role.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Founder => "founder",
            Self::Manager => "manager",
            Self::Member => "member",
        }
    }

    /// Parse a role, mapping anything unrecognized to `Member`.
    #[must_use]
    pub fn parse_lossy(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }

    #[must_use]
    pub fn is_founder(&self) -> bool {
        matches!(self, Self::Founder)
    }
}

/// Error returned when parsing a role string fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseRoleError {
    invalid_value: String,
}

impl fmt::Display for ParseRoleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid role: '{}' (expected: founder, manager, or member)",
            self.invalid_value
        )
    }
}

impl std::error::Error for ParseRoleError {}

impl FromStr for StartupRole {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "founder" => Ok(Self::Founder),
            "manager" => Ok(Self::Manager),
            "member" => Ok(Self::Member),
            _ => Err(ParseRoleError {
                invalid_value: s.to_string(),
            }),
        }
    }
}

impl From<String> for StartupRole {
    fn from(s: String) -> Self {
        Self::parse_lossy(&s)
    }
}

impl From<Option<String>> for StartupRole {
    fn from(s: Option<String>) -> Self {
        s.map(Self::from).unwrap_or_default()
    }
}

impl From<StartupRole> for String {
    fn from(role: StartupRole) -> Self {
        role.as_str().to_string()
    }
}

impl fmt::Display for StartupRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A startup the current user belongs to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Startup {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub stage: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    /// Only populated for callers allowed to see it.
    #[serde(default)]
    pub invite_code: Option<String>,
    /// The caller's role in this startup.
    #[serde(default, alias = "role")]
    pub user_role: StartupRole,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl Startup {
    pub fn new(id: impl Into<String>, name: impl Into<String>, user_role: StartupRole) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            industry: None,
            stage: None,
            website: None,
            invite_code: None,
            user_role,
            created_at: None,
        }
    }
}

/// A member record as listed on a startup's team page.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: StartupRole,
}

impl Member {
    pub fn initials(&self) -> String {
        crate::profile::initials(self.full_name.as_deref(), self.email.as_deref())
    }
}

/// Industry choices offered during onboarding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Industry {
    Saas,
    Fintech,
    Healthtech,
    Edtech,
    Ecommerce,
    AiMl,
    Marketplace,
    Other,
}

/// Company stage; new startups default to `Idea`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    #[default]
    Idea,
    Mvp,
    Growth,
    Scale,
}

/// Onboarding input for `POST /startups`.
///
/// Validated client-side; an invalid value is never sent.
///
/// # Example
///
/// ```rust
/// use tenantry::tenants::NewStartup;
/// use validator::Validate;
///
/// assert!(NewStartup::named("   ").validate().is_err());
/// assert!(NewStartup::named("Acme Inc").validate().is_ok());
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Validate)]
pub struct NewStartup {
    #[validate(custom(function = "validate_not_blank"))]
    pub name: String,

    #[validate(length(max = 2000, message = "Description is too long"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub industry: Option<Industry>,

    pub stage: Stage,

    #[validate(url(message = "Website must be a valid URL"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
}

impl NewStartup {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = non_empty(description.into());
        self
    }

    #[must_use]
    pub fn industry(mut self, industry: Industry) -> Self {
        self.industry = Some(industry);
        self
    }

    #[must_use]
    pub fn stage(mut self, stage: Stage) -> Self {
        self.stage = stage;
        self
    }

    #[must_use]
    pub fn website(mut self, website: impl Into<String>) -> Self {
        self.website = non_empty(website.into());
        self
    }

    /// Trim free-text fields and drop empty optional ones.
    #[must_use]
    pub fn normalized(self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            description: self.description.and_then(non_empty),
            industry: self.industry,
            stage: self.stage,
            website: self.website.and_then(non_empty),
        }
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("required");
        err.message = Some(Cow::Borrowed("Startup name is required"));
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parsing() {
        assert_eq!("founder".parse::<StartupRole>().unwrap(), StartupRole::Founder);
        assert_eq!("MANAGER".parse::<StartupRole>().unwrap(), StartupRole::Manager);
        assert_eq!("Member".parse::<StartupRole>().unwrap(), StartupRole::Member);
        assert!("guest".parse::<StartupRole>().is_err());
    }

    #[test]
    fn test_role_lossy_is_fail_closed() {
        assert_eq!(StartupRole::parse_lossy("guest"), StartupRole::Member);
        assert_eq!(StartupRole::parse_lossy(""), StartupRole::Member);
        assert_eq!(StartupRole::parse_lossy("owner"), StartupRole::Member);
    }

    #[test]
    fn test_role_serialization() {
        let json = serde_json::to_string(&StartupRole::Founder).unwrap();
        assert_eq!(json, "\"founder\"");

        let parsed: StartupRole = serde_json::from_str("\"admin\"").unwrap();
        assert_eq!(parsed, StartupRole::Member);
    }

    #[test]
    fn test_startup_deserialize_missing_role_defaults_to_member() {
        let startup: Startup =
            serde_json::from_str(r#"{"id": "s1", "name": "Acme", "stage": "mvp"}"#).unwrap();
        assert_eq!(startup.user_role, StartupRole::Member);
        assert_eq!(startup.stage.as_deref(), Some("mvp"));
    }

    #[test]
    fn test_startup_deserialize_user_role() {
        let startup: Startup =
            serde_json::from_str(r#"{"id": "s1", "name": "Acme", "user_role": "founder"}"#)
                .unwrap();
        assert_eq!(startup.user_role, StartupRole::Founder);
    }

    #[test]
    fn test_null_role_does_not_fail_the_list() {
        let startups: Vec<Startup> = serde_json::from_str(
            r#"[{"id": "s1", "name": "Acme", "user_role": null},
                {"id": "s2", "name": "Beta", "user_role": "founder"}]"#,
        )
        .unwrap();
        assert_eq!(startups[0].user_role, StartupRole::Member);
        assert_eq!(startups[1].user_role, StartupRole::Founder);

        let member: Member =
            serde_json::from_str(r#"{"id": "m1", "user_id": "u1", "role": null}"#).unwrap();
        assert_eq!(member.role, StartupRole::Member);
    }

    #[test]
    fn test_member_deserialize() {
        let member: Member = serde_json::from_str(
            r#"{"id": "m1", "user_id": "u1", "full_name": "Ada Lovelace", "email": null, "role": "manager"}"#,
        )
        .unwrap();
        assert_eq!(member.role, StartupRole::Manager);
        assert_eq!(member.initials(), "AL");
    }

    #[test]
    fn test_new_startup_requires_name() {
        let err = NewStartup::named("").validate().unwrap_err();
        assert!(err.field_errors().contains_key("name"));

        let err = NewStartup::named("   ").validate().unwrap_err();
        assert!(err.field_errors().contains_key("name"));
    }

    #[test]
    fn test_new_startup_rejects_bad_website() {
        let startup = NewStartup::named("Acme").website("not a url");
        assert!(startup.validate().is_err());

        let startup = NewStartup::named("Acme").website("https://acme.example");
        assert!(startup.validate().is_ok());
    }

    #[test]
    fn test_new_startup_serialization() {
        let startup = NewStartup::named(" Acme ")
            .industry(Industry::AiMl)
            .website("")
            .normalized();
        let json = serde_json::to_value(&startup).unwrap();
        assert_eq!(json["name"], "Acme");
        assert_eq!(json["industry"], "ai_ml");
        assert_eq!(json["stage"], "idea");
        assert!(json.get("website").is_none());
        assert!(json.get("description").is_none());
    }
}

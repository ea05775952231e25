//! In-memory workspace backend.

use crate::error::{Result, TenantryError};
use crate::profile::Profile;
use crate::session::{AccessToken, Session, UserIdentity};
use crate::tenants::{Member, NewStartup, Startup, StartupRole};
use crate::traits::workspace::WorkspaceApi;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

struct Membership {
    startup_id: String,
    member: Member,
}

#[derive(Default)]
struct FakeState {
    tokens: HashMap<String, UserIdentity>,
    profiles: HashMap<String, Profile>,
    startups: Vec<Startup>,
    // Creation order doubles as server order for GET /startups
    memberships: Vec<Membership>,
    invite_codes: HashMap<String, String>,
    calls: HashMap<String, usize>,
    latency: HashMap<String, Duration>,
    offline: bool,
    next_id: u64,
}

impl FakeState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}_{}", prefix, self.next_id)
    }

    fn role_of(&self, user_id: &str, startup_id: &str) -> Option<StartupRole> {
        self.memberships
            .iter()
            .find(|m| m.startup_id == startup_id && m.member.user_id == user_id)
            .map(|m| m.member.role)
    }

    fn ensure_invite_code(&mut self, startup_id: &str) {
        if !self.invite_codes.contains_key(startup_id) {
            self.invite_codes
                .insert(startup_id.to_string(), generate_code());
        }
    }
}

fn generate_code() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_uppercase()
}

/// Workspace backend held in memory.
///
/// Mirrors the server's behavior closely enough for orchestration tests:
/// tokens must come from [`sign_in`](Self::sign_in), startups are listed in
/// membership-creation order with the caller's role, and team endpoints
/// enforce roles server-side. Cloning shares the same data.
#[derive(Clone, Default)]
pub struct InMemoryWorkspaceApi {
    state: Arc<Mutex<FakeState>>,
}

impl InMemoryWorkspaceApi {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a fresh token for `user_id`.
    pub fn sign_in(&self, user_id: &str, email: &str) -> Session {
        let mut state = self.state.lock().unwrap();
        let token = format!("token-{}-{}", user_id, state.next_id("t"));
        let user = UserIdentity::new(user_id).with_email(email);
        state.tokens.insert(token.clone(), user.clone());
        Session::new(token, user)
    }

    /// Store an existing profile for `user_id`.
    pub fn insert_profile(&self, user_id: &str, profile: Profile) {
        self.state
            .lock()
            .unwrap()
            .profiles
            .insert(user_id.to_string(), profile);
    }

    /// Make `user_id` a member of `startup` with `startup.user_role`.
    ///
    /// The startup is created on first use, with an invite code.
    pub fn add_startup(&self, user_id: &str, startup: Startup) {
        let mut state = self.state.lock().unwrap();
        let role = startup.user_role;
        let startup_id = startup.id.clone();

        if !state.startups.iter().any(|s| s.id == startup_id) {
            state.startups.push(startup);
        }
        state.ensure_invite_code(&startup_id);

        let member_id = state.next_id("m");
        state.memberships.push(Membership {
            startup_id,
            member: Member {
                id: member_id,
                user_id: user_id.to_string(),
                full_name: None,
                email: None,
                role,
            },
        });
    }

    /// Add a member record directly.
    pub fn add_member(&self, startup_id: &str, member: Member) {
        self.state.lock().unwrap().memberships.push(Membership {
            startup_id: startup_id.to_string(),
            member,
        });
    }

    /// User ids currently in `startup_id`.
    pub fn member_ids(&self, startup_id: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .memberships
            .iter()
            .filter(|m| m.startup_id == startup_id)
            .map(|m| m.member.user_id.clone())
            .collect()
    }

    /// The active invite code for `startup_id`.
    pub fn invite_code(&self, startup_id: &str) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .invite_codes
            .get(startup_id)
            .cloned()
    }

    /// Drop the invite code so the endpoint reports none.
    pub fn clear_invite_code(&self, startup_id: &str) {
        self.state.lock().unwrap().invite_codes.remove(startup_id);
    }

    /// Whether `code` would currently be accepted for `startup_id`.
    pub fn is_code_valid(&self, startup_id: &str, code: &str) -> bool {
        self.invite_code(startup_id).as_deref() == Some(code)
    }

    /// Number of requests made to `route`, e.g. `"GET /startups"` or
    /// `"POST /startups/s1/regenerate-invite"`.
    pub fn calls(&self, route: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .get(route)
            .copied()
            .unwrap_or(0)
    }

    /// Fail every request with a 503 while set.
    pub fn set_offline(&self, offline: bool) {
        self.state.lock().unwrap().offline = offline;
    }

    /// Delay every response to requests made with `user_id`'s tokens.
    pub fn set_latency(&self, user_id: &str, latency: Duration) {
        self.state
            .lock()
            .unwrap()
            .latency
            .insert(user_id.to_string(), latency);
    }

    /// Record the call, apply latency, then authenticate the token.
    async fn begin(&self, route: String, token: &AccessToken) -> Result<UserIdentity> {
        let latency = {
            let mut state = self.state.lock().unwrap();
            *state.calls.entry(route).or_insert(0) += 1;
            state
                .tokens
                .get(token.expose())
                .and_then(|user| state.latency.get(&user.id))
                .copied()
        };

        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let state = self.state.lock().unwrap();
        if state.offline {
            return Err(TenantryError::service_unavailable("Backend unreachable"));
        }
        state
            .tokens
            .get(token.expose())
            .cloned()
            .ok_or_else(|| TenantryError::unauthorized("Invalid token"))
    }

    fn require_member(state: &FakeState, user_id: &str, startup_id: &str) -> Result<StartupRole> {
        if !state.startups.iter().any(|s| s.id == startup_id) {
            return Err(TenantryError::not_found("Startup not found"));
        }
        state
            .role_of(user_id, startup_id)
            .ok_or_else(|| TenantryError::forbidden("Not a member of this startup"))
    }
}

#[async_trait]
impl WorkspaceApi for InMemoryWorkspaceApi {
    async fn fetch_profile(&self, token: &AccessToken) -> Result<Profile> {
        let user = self.begin("GET /auth/me".into(), token).await?;
        self.state
            .lock()
            .unwrap()
            .profiles
            .get(&user.id)
            .cloned()
            .ok_or_else(|| TenantryError::not_found("Profile not found"))
    }

    async fn verify_profile(&self, token: &AccessToken) -> Result<Profile> {
        let user = self.begin("POST /auth/verify".into(), token).await?;
        let mut state = self.state.lock().unwrap();
        if let Some(profile) = state.profiles.get(&user.id) {
            return Ok(profile.clone());
        }

        let mut profile = Profile::new(state.next_id("profile"));
        profile.email = user.email.clone();
        state.profiles.insert(user.id, profile.clone());
        Ok(profile)
    }

    async fn list_startups(&self, token: &AccessToken) -> Result<Vec<Startup>> {
        let user = self.begin("GET /startups".into(), token).await?;
        let state = self.state.lock().unwrap();

        let startups = state
            .memberships
            .iter()
            .filter(|m| m.member.user_id == user.id)
            .filter_map(|m| {
                state
                    .startups
                    .iter()
                    .find(|s| s.id == m.startup_id)
                    .map(|s| Startup {
                        user_role: m.member.role,
                        ..s.clone()
                    })
            })
            .collect();
        Ok(startups)
    }

    async fn create_startup(&self, token: &AccessToken, startup: &NewStartup) -> Result<Startup> {
        let user = self.begin("POST /startups".into(), token).await?;
        if startup.name.trim().is_empty() {
            return Err(TenantryError::bad_request("Startup name is required"));
        }

        let mut state = self.state.lock().unwrap();
        let id = state.next_id("startup");
        let created = Startup {
            description: startup.description.clone(),
            industry: startup
                .industry
                .and_then(|i| serde_json::to_value(i).ok())
                .and_then(|v| v.as_str().map(str::to_string)),
            stage: serde_json::to_value(startup.stage)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string)),
            website: startup.website.clone(),
            ..Startup::new(id.clone(), startup.name.trim(), StartupRole::Founder)
        };

        state.startups.push(created.clone());
        state.ensure_invite_code(&id);
        let member_id = state.next_id("m");
        state.memberships.push(Membership {
            startup_id: id,
            member: Member {
                id: member_id,
                user_id: user.id,
                full_name: None,
                email: user.email,
                role: StartupRole::Founder,
            },
        });
        Ok(created)
    }

    async fn list_members(&self, token: &AccessToken, startup_id: &str) -> Result<Vec<Member>> {
        let route = format!("GET /startups/{}/members", startup_id);
        let user = self.begin(route, token).await?;
        let state = self.state.lock().unwrap();
        Self::require_member(&state, &user.id, startup_id)?;

        Ok(state
            .memberships
            .iter()
            .filter(|m| m.startup_id == startup_id)
            .map(|m| m.member.clone())
            .collect())
    }

    async fn get_invite_code(
        &self,
        token: &AccessToken,
        startup_id: &str,
    ) -> Result<Option<String>> {
        let route = format!("GET /startups/{}/invite-code", startup_id);
        let user = self.begin(route, token).await?;
        let state = self.state.lock().unwrap();

        if Self::require_member(&state, &user.id, startup_id)? == StartupRole::Member {
            return Err(TenantryError::forbidden(
                "Only founders and managers can view the invite code",
            ));
        }
        Ok(state.invite_codes.get(startup_id).cloned())
    }

    async fn regenerate_invite_code(&self, token: &AccessToken, startup_id: &str) -> Result<String> {
        let route = format!("POST /startups/{}/regenerate-invite", startup_id);
        let user = self.begin(route, token).await?;
        let mut state = self.state.lock().unwrap();

        if !Self::require_member(&state, &user.id, startup_id)?.is_founder() {
            return Err(TenantryError::forbidden(
                "Only founders can regenerate invite codes",
            ));
        }
        let code = generate_code();
        state
            .invite_codes
            .insert(startup_id.to_string(), code.clone());
        Ok(code)
    }

    async fn remove_member(&self, token: &AccessToken, startup_id: &str, user_id: &str) -> Result<()> {
        let route = format!("DELETE /startups/{}/members/{}", startup_id, user_id);
        let user = self.begin(route, token).await?;
        let mut state = self.state.lock().unwrap();

        if !Self::require_member(&state, &user.id, startup_id)?.is_founder() {
            return Err(TenantryError::forbidden("Only founders can remove members"));
        }
        match state.role_of(user_id, startup_id) {
            None => return Err(TenantryError::not_found("Member not found")),
            Some(StartupRole::Founder) => {
                return Err(TenantryError::bad_request("Cannot remove the founder"));
            }
            Some(_) => {}
        }

        state
            .memberships
            .retain(|m| !(m.startup_id == startup_id && m.member.user_id == user_id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_list_startups_in_membership_order_with_role() {
        let api = InMemoryWorkspaceApi::new();
        let session = api.sign_in("u1", "u1@example.com");
        api.add_startup("u1", Startup::new("b", "Beta", StartupRole::Manager));
        api.add_startup("u1", Startup::new("a", "Alpha", StartupRole::Founder));

        let list = api.list_startups(&session.access_token).await.unwrap();
        let ids: Vec<_> = list.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(list[0].user_role, StartupRole::Manager);
        assert_eq!(api.calls("GET /startups"), 1);
    }

    #[tokio::test]
    async fn test_regenerate_invalidates_previous_code() {
        let api = InMemoryWorkspaceApi::new();
        let session = api.sign_in("u1", "u1@example.com");
        api.add_startup("u1", Startup::new("s1", "S", StartupRole::Founder));
        let old = api.invite_code("s1").unwrap();

        let new = api
            .regenerate_invite_code(&session.access_token, "s1")
            .await
            .unwrap();
        assert_ne!(old, new);
        assert!(!api.is_code_valid("s1", &old));
        assert!(api.is_code_valid("s1", &new));
    }

    #[tokio::test]
    async fn test_server_rejects_member_invite_access() {
        let api = InMemoryWorkspaceApi::new();
        let session = api.sign_in("u1", "u1@example.com");
        api.add_startup("u1", Startup::new("s1", "S", StartupRole::Member));

        let err = api
            .get_invite_code(&session.access_token, "s1")
            .await
            .unwrap_err();
        assert!(matches!(err, TenantryError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_unknown_token_is_unauthorized() {
        let api = InMemoryWorkspaceApi::new();
        let err = api
            .list_startups(&AccessToken::new("nope"))
            .await
            .unwrap_err();
        assert!(matches!(err, TenantryError::Unauthorized(_)));
    }
}

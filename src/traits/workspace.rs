//! Workspace backend trait
//!
//! The REST contract the client depends on. Every call is authenticated
//! with the session's bearer token.

use crate::error::Result;
use crate::profile::Profile;
use crate::session::AccessToken;
use crate::tenants::{Member, NewStartup, Startup};
use async_trait::async_trait;

/// Backend operations for profiles, startups, members and invite codes.
#[async_trait]
pub trait WorkspaceApi: Send + Sync {
    /// `GET /auth/me`
    async fn fetch_profile(&self, token: &AccessToken) -> Result<Profile>;

    /// `POST /auth/verify`, creating the profile if it does not exist yet.
    async fn verify_profile(&self, token: &AccessToken) -> Result<Profile>;

    /// `GET /startups`, in server order (membership-creation order).
    async fn list_startups(&self, token: &AccessToken) -> Result<Vec<Startup>>;

    /// `POST /startups`
    async fn create_startup(&self, token: &AccessToken, startup: &NewStartup) -> Result<Startup>;

    /// `GET /startups/{id}/members`
    async fn list_members(&self, token: &AccessToken, startup_id: &str) -> Result<Vec<Member>>;

    /// `GET /startups/{id}/invite-code`. `None` when no code is available.
    async fn get_invite_code(&self, token: &AccessToken, startup_id: &str)
        -> Result<Option<String>>;

    /// `POST /startups/{id}/regenerate-invite`. The previous code stops working.
    async fn regenerate_invite_code(&self, token: &AccessToken, startup_id: &str)
        -> Result<String>;

    /// `DELETE /startups/{id}/members/{user_id}`
    async fn remove_member(&self, token: &AccessToken, startup_id: &str, user_id: &str)
        -> Result<()>;
}

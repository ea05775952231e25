//! reqwest implementation of [`WorkspaceApi`].

use crate::config::ApiConfig;
use crate::error::{ErrorBody, Result, TenantryError};
use crate::profile::Profile;
use crate::session::AccessToken;
use crate::tenants::{Member, NewStartup, Startup};
use crate::traits::workspace::WorkspaceApi;
use async_trait::async_trait;
use reqwest::{Method, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, instrument};

const DEFAULT_USER_AGENT: &str = concat!("tenantry/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct InviteCodeBody {
    #[serde(default)]
    invite_code: Option<String>,
}

/// Workspace backend over HTTP.
///
/// Every request carries `Authorization: Bearer <token>` and is bounded by
/// the client timeout. Non-success responses become [`TenantryError`]s
/// carrying the backend's `detail`.
///
/// # Example
///
/// ```rust,no_run
/// use tenantry::client::HttpWorkspaceApi;
/// use std::time::Duration;
///
/// let api = HttpWorkspaceApi::new("https://app.example.com")
///     .with_timeout(Duration::from_secs(10));
/// assert_eq!(api.api_root(), "https://app.example.com/api");
/// ```
#[derive(Clone, Debug)]
pub struct HttpWorkspaceApi {
    api_root: String,
    client: reqwest::Client,
    timeout: Duration,
    user_agent: String,
}

impl HttpWorkspaceApi {
    /// Client for the backend at `base_url` with default settings.
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        let config = ApiConfig {
            base_url: base_url.to_string(),
            ..ApiConfig::default()
        };
        Self::from_config(&config)
    }

    #[must_use]
    pub fn from_config(config: &ApiConfig) -> Self {
        let user_agent = if config.user_agent.is_empty() {
            DEFAULT_USER_AGENT.to_string()
        } else {
            config.user_agent.clone()
        };
        let timeout = config.timeout();
        Self {
            api_root: config.api_root(),
            client: Self::build_client(timeout, &user_agent),
            timeout,
            user_agent,
        }
    }

    /// Set the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self.client = Self::build_client(timeout, &self.user_agent);
        self
    }

    fn build_client(timeout: Duration, user_agent: &str) -> reqwest::Client {
        reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .unwrap_or_default()
    }

    /// Root URL requests are made against.
    pub fn api_root(&self) -> &str {
        &self.api_root
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_root, path)
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        token: &AccessToken,
        body: Option<&serde_json::Value>,
    ) -> Result<Response> {
        debug!(%method, path, "Workspace API request");

        let mut request = self
            .client
            .request(method, self.url(path))
            .bearer_auth(token.expose());
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let detail = response
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(|body| body.detail);
        Err(TenantryError::from_status(status.as_u16(), detail))
    }

    async fn json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        token: &AccessToken,
        body: Option<&serde_json::Value>,
    ) -> Result<T> {
        let response = self.send(method, path, token, body).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl WorkspaceApi for HttpWorkspaceApi {
    #[instrument(skip_all)]
    async fn fetch_profile(&self, token: &AccessToken) -> Result<Profile> {
        self.json(Method::GET, "/auth/me", token, None).await
    }

    #[instrument(skip_all)]
    async fn verify_profile(&self, token: &AccessToken) -> Result<Profile> {
        self.json(Method::POST, "/auth/verify", token, None).await
    }

    #[instrument(skip_all)]
    async fn list_startups(&self, token: &AccessToken) -> Result<Vec<Startup>> {
        self.json(Method::GET, "/startups", token, None).await
    }

    #[instrument(skip_all, fields(name = %startup.name))]
    async fn create_startup(&self, token: &AccessToken, startup: &NewStartup) -> Result<Startup> {
        let body = serde_json::to_value(startup)?;
        self.json(Method::POST, "/startups", token, Some(&body)).await
    }

    #[instrument(skip(self, token))]
    async fn list_members(&self, token: &AccessToken, startup_id: &str) -> Result<Vec<Member>> {
        let path = format!("/startups/{}/members", startup_id);
        self.json(Method::GET, &path, token, None).await
    }

    #[instrument(skip(self, token))]
    async fn get_invite_code(
        &self,
        token: &AccessToken,
        startup_id: &str,
    ) -> Result<Option<String>> {
        let path = format!("/startups/{}/invite-code", startup_id);
        let body: InviteCodeBody = self.json(Method::GET, &path, token, None).await?;
        Ok(body.invite_code.filter(|code| !code.is_empty()))
    }

    #[instrument(skip(self, token))]
    async fn regenerate_invite_code(&self, token: &AccessToken, startup_id: &str) -> Result<String> {
        let path = format!("/startups/{}/regenerate-invite", startup_id);
        let body: InviteCodeBody = self.json(Method::POST, &path, token, None).await?;
        body.invite_code
            .filter(|code| !code.is_empty())
            .ok_or_else(|| TenantryError::internal("Response did not include an invite code"))
    }

    #[instrument(skip(self, token))]
    async fn remove_member(&self, token: &AccessToken, startup_id: &str, user_id: &str) -> Result<()> {
        let path = format!("/startups/{}/members/{}", startup_id, user_id);
        self.send(Method::DELETE, &path, token, None).await?;
        Ok(())
    }
}

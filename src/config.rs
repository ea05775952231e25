use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Result, TenantryError};
use crate::utils::{get_env_with_prefix, parse_env_with_prefix};

/// Main configuration for a tenantry client
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub callback: CallbackConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Workspace backend connection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    /// Backend origin; requests go to `{base_url}/api/...`.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout. Every backend call is bounded by it.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

/// Identity-provider redirect callback handling.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CallbackConfig {
    /// How many times to look for the session after a code exchange.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Fixed delay between session polls.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Delay before sending the user back to the login screen on failure.
    #[serde(default = "default_error_redirect_delay_ms")]
    pub error_redirect_delay_ms: u64,
    /// Delay before entering the application on success.
    #[serde(default = "default_success_redirect_delay_ms")]
    pub success_redirect_delay_ms: u64,
    #[serde(default = "default_login_path")]
    pub login_path: String,
    #[serde(default = "default_home_path")]
    pub home_path: String,
}

/// Durable client storage for the selected startup.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// JSON file backing the key-value store. `None` keeps it in memory.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Key holding the last selected startup id.
    #[serde(default = "default_selection_key")]
    pub selection_key: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_seconds: default_timeout_seconds(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for CallbackConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            error_redirect_delay_ms: default_error_redirect_delay_ms(),
            success_redirect_delay_ms: default_success_redirect_delay_ms(),
            login_path: default_login_path(),
            home_path: default_home_path(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: None,
            selection_key: default_selection_key(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8001".to_string()
}

fn default_timeout_seconds() -> u64 {
    15
}

fn default_user_agent() -> String {
    concat!("tenantry/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_attempts() -> u32 {
    10
}

fn default_retry_delay_ms() -> u64 {
    500
}

fn default_error_redirect_delay_ms() -> u64 {
    3000
}

fn default_success_redirect_delay_ms() -> u64 {
    500
}

fn default_login_path() -> String {
    "/auth".to_string()
}

fn default_home_path() -> String {
    "/dashboard".to_string()
}

fn default_selection_key() -> String {
    "currentStartupId".to_string()
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Root of the REST API (`{base_url}/api`).
    pub fn api_root(&self) -> String {
        format!("{}/api", self.base_url.trim_end_matches('/'))
    }
}

impl CallbackConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn error_redirect_delay(&self) -> Duration {
        Duration::from_millis(self.error_redirect_delay_ms)
    }

    pub fn success_redirect_delay(&self) -> Duration {
        Duration::from_millis(self.success_redirect_delay_ms)
    }
}

/// Builder for Config with environment variable support
#[must_use = "builder does nothing until you call build()"]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.api.base_url = url.into();
        self
    }

    pub fn with_timeout_seconds(mut self, seconds: u64) -> Self {
        self.config.api.timeout_seconds = seconds;
        self
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn with_json_logging(mut self, enabled: bool) -> Self {
        self.config.logging.json = enabled;
        self
    }

    pub fn with_callback(mut self, callback: CallbackConfig) -> Self {
        self.config.callback = callback;
        self
    }

    pub fn with_storage_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.storage.path = Some(path.into());
        self
    }

    pub fn with_selection_key(mut self, key: impl Into<String>) -> Self {
        self.config.storage.selection_key = key.into();
        self
    }

    /// Overlay values from `TENANTRY_*` (or bare) environment variables.
    pub fn from_env(mut self) -> Self {
        if let Some(url) = get_env_with_prefix("API_URL") {
            self.config.api.base_url = url;
        }
        if let Some(timeout) = parse_env_with_prefix("API_TIMEOUT_SECONDS") {
            self.config.api.timeout_seconds = timeout;
        }
        if let Some(level) = get_env_with_prefix("LOG_LEVEL") {
            self.config.logging.level = level;
        }
        if let Some(json) = parse_env_with_prefix("LOG_JSON") {
            self.config.logging.json = json;
        }
        if let Some(attempts) = parse_env_with_prefix("CALLBACK_MAX_ATTEMPTS") {
            self.config.callback.max_attempts = attempts;
        }
        if let Some(delay) = parse_env_with_prefix("CALLBACK_RETRY_DELAY_MS") {
            self.config.callback.retry_delay_ms = delay;
        }
        if let Some(path) = get_env_with_prefix("STORAGE_PATH") {
            self.config.storage.path = Some(PathBuf::from(path));
        }
        if let Some(key) = get_env_with_prefix("SELECTION_KEY") {
            self.config.storage.selection_key = key;
        }
        self
    }

    /// Validate and return the configuration.
    pub fn build(self) -> Result<Config> {
        let config = self.config;

        let url = url::Url::parse(&config.api.base_url).map_err(|e| {
            TenantryError::bad_request(format!(
                "Invalid API base URL '{}': {}",
                config.api.base_url, e
            ))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(TenantryError::bad_request(format!(
                "API base URL must be http or https, got '{}'",
                url.scheme()
            )));
        }
        if config.api.timeout_seconds == 0 {
            return Err(TenantryError::bad_request("API timeout must be at least one second"));
        }
        if config.callback.max_attempts == 0 {
            return Err(TenantryError::bad_request(
                "Callback max_attempts must be at least 1",
            ));
        }
        if config.storage.selection_key.trim().is_empty() {
            return Err(TenantryError::bad_request("Selection key cannot be empty"));
        }

        Ok(config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

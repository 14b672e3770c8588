use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use super::deployment::DeploymentMode;
use super::token::mask_secret;

/// Username/password pair used against the login endpoint
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Account name
    pub username: String,
    /// Account password
    pub password: String,
}

impl Credentials {
    /// Create a credential pair
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Connection and authentication settings for one AnythingLLM instance
///
/// Built once (usually by [`ConfigLoader`](crate::infrastructure::config::ConfigLoader))
/// and then shared read-only behind an `Arc` by every client of a session.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Deployment the settings were resolved for
    pub deployment_mode: DeploymentMode,

    /// Scheme, host and optional port (no trailing slash)
    pub base_url: String,

    /// Path prefix for every API endpoint
    pub api_prefix: String,

    /// Login endpoint, relative to the API prefix
    pub login_endpoint: String,

    /// Refresh endpoint, relative to the API prefix
    pub refresh_endpoint: String,

    /// Token validation endpoint, relative to the API prefix
    pub validate_endpoint: String,

    /// Header carrying the token
    pub token_header: String,

    /// Scheme written before the token (empty for a bare token)
    pub token_prefix: String,

    /// Tokens this close to expiry are refreshed before use
    pub token_expiry_buffer_secs: u64,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    /// Retry budget offered to callers through `RetryPolicy`
    pub max_retries: u32,

    /// Initial retry delay in milliseconds
    pub retry_delay_ms: u64,

    /// Verify TLS certificates
    pub verify_ssl: bool,

    /// Whether the instance supports token refresh
    pub refresh_supported: bool,

    /// Login credentials, if provided by the environment
    pub credentials: Option<Credentials>,

    /// Static token (API key), if provided by the environment
    pub token: Option<String>,
}

impl Config {
    /// Defaults for a deployment mode
    ///
    /// Cloud deployments have no default address, so `base_url` is left
    /// empty and the config fails validation until one is set.
    pub fn for_mode(mode: DeploymentMode) -> Self {
        Self {
            deployment_mode: mode,
            base_url: mode.default_base_url().unwrap_or_default().to_string(),
            api_prefix: "/api".to_string(),
            login_endpoint: "/auth/login".to_string(),
            refresh_endpoint: "/auth/refresh".to_string(),
            validate_endpoint: "/auth/validate".to_string(),
            token_header: "Authorization".to_string(),
            token_prefix: "Bearer".to_string(),
            token_expiry_buffer_secs: 300,
            timeout_secs: mode.default_timeout_secs(),
            max_retries: 3,
            retry_delay_ms: mode.default_retry_delay_ms(),
            verify_ssl: mode.default_verify_ssl(),
            refresh_supported: mode.supports_refresh(),
            credentials: None,
            token: None,
        }
    }

    /// Full URL for an endpoint
    ///
    /// The API prefix is inserted unless the base URL or the endpoint
    /// already carries it.
    pub fn endpoint_url(&self, endpoint: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let prefix = self.api_prefix.trim_matches('/');
        let endpoint = endpoint.trim_start_matches('/');

        let prefixed = prefix.is_empty()
            || base.ends_with(&format!("/{prefix}"))
            || endpoint == prefix
            || endpoint.starts_with(&format!("{prefix}/"));

        if prefixed {
            format!("{base}/{endpoint}")
        } else {
            format!("{base}/{prefix}/{endpoint}")
        }
    }

    /// Value for the token header, e.g. `Bearer abc123`
    pub fn authorization_value(&self, token: &str) -> String {
        let prefix = self.token_prefix.trim();
        if prefix.is_empty() {
            token.to_string()
        } else {
            format!("{prefix} {token}")
        }
    }

    /// Request timeout
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Expiry buffer as a chrono duration
    pub fn token_expiry_buffer(&self) -> chrono::Duration {
        // chrono panics on durations beyond i64::MAX milliseconds
        let secs = i64::try_from(self.token_expiry_buffer_secs).unwrap_or(i64::MAX);
        chrono::Duration::seconds(secs.min(i64::MAX / 1000))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::for_mode(DeploymentMode::default())
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("deployment_mode", &self.deployment_mode)
            .field("base_url", &self.base_url)
            .field("api_prefix", &self.api_prefix)
            .field("login_endpoint", &self.login_endpoint)
            .field("refresh_endpoint", &self.refresh_endpoint)
            .field("validate_endpoint", &self.validate_endpoint)
            .field("token_header", &self.token_header)
            .field("token_prefix", &self.token_prefix)
            .field("token_expiry_buffer_secs", &self.token_expiry_buffer_secs)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("retry_delay_ms", &self.retry_delay_ms)
            .field("verify_ssl", &self.verify_ssl)
            .field("refresh_supported", &self.refresh_supported)
            .field("credentials", &self.credentials)
            .field("token", &self.token.as_deref().map(|t| mask_secret(t, 4)))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_docker_defaults() {
        let config = Config::for_mode(DeploymentMode::Docker);
        assert_eq!(config.base_url, "http://localhost:3001");
        assert_eq!(config.timeout_secs, 30);
        assert!(!config.verify_ssl);
        assert!(config.refresh_supported);
        assert_eq!(config.token_header, "Authorization");
        assert_eq!(config.token_prefix, "Bearer");
    }

    #[test]
    fn test_cloud_has_no_default_base_url() {
        let config = Config::for_mode(DeploymentMode::Cloud);
        assert!(config.base_url.is_empty());
    }

    #[test]
    fn test_endpoint_url_inserts_prefix() {
        let config = Config::for_mode(DeploymentMode::Docker);
        assert_eq!(
            config.endpoint_url("/auth/login"),
            "http://localhost:3001/api/auth/login"
        );
        assert_eq!(
            config.endpoint_url("v1/documents"),
            "http://localhost:3001/api/v1/documents"
        );
    }

    #[test]
    fn test_endpoint_url_does_not_duplicate_prefix() {
        let config = Config {
            base_url: "https://x/api".to_string(),
            ..Config::for_mode(DeploymentMode::Cloud)
        };
        assert_eq!(config.endpoint_url("/v1/documents"), "https://x/api/v1/documents");

        let config = Config::for_mode(DeploymentMode::Docker);
        assert_eq!(
            config.endpoint_url("/api/auth/login"),
            "http://localhost:3001/api/auth/login"
        );
    }

    #[test]
    fn test_endpoint_url_without_prefix() {
        let config = Config {
            api_prefix: String::new(),
            base_url: "http://custom-host:8080/".to_string(),
            ..Config::default()
        };
        assert_eq!(
            config.endpoint_url("/custom-auth/login"),
            "http://custom-host:8080/custom-auth/login"
        );
    }

    #[test]
    fn test_authorization_value() {
        let mut config = Config::default();
        assert_eq!(config.authorization_value("abc123"), "Bearer abc123");

        config.token_prefix = "Token".to_string();
        assert_eq!(config.authorization_value("abc123"), "Token abc123");

        config.token_prefix = String::new();
        assert_eq!(config.authorization_value("abc123"), "abc123");
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = Config {
            credentials: Some(Credentials::new("alice", "hunter2")),
            token: Some("sk-static-api-key".to_string()),
            ..Config::default()
        };
        let rendered = format!("{config:?}");
        assert!(rendered.contains("alice"));
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("sk-static-api-key"));
    }
}

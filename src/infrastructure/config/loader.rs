use figment::providers::Serialized;
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::domain::models::{Config, Credentials, DeploymentMode, ParseDeploymentModeError};

/// Prefix shared by every recognised environment variable
pub const ENV_PREFIX: &str = "ANYTHING_LLM_";

/// Variable naming the deployment mode explicitly
pub const MODE_ENV: &str = "ANYTHING_LLM_DEPLOYMENT_MODE";

/// Variable whose presence marks a Docker deployment
pub const DOCKER_ENV: &str = "ANYTHING_LLM_DOCKER";

/// Variable whose presence marks a Desktop deployment
pub const DESKTOP_ENV: &str = "ANYTHING_LLM_DESKTOP";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("No base URL configured for {0} deployment. Set ANYTHING_LLM_BASE_URL")]
    MissingBaseUrl(DeploymentMode),

    #[error("Invalid base URL: {0}. Must be an absolute http:// or https:// URL")]
    InvalidBaseUrl(String),

    #[error("Invalid timeout: {0}. Must be positive")]
    InvalidTimeout(u64),

    #[error("Invalid token header: {0:?}")]
    InvalidTokenHeader(String),

    #[error("Incomplete credentials: {present} is set but {missing} is missing")]
    IncompleteCredentials {
        present: &'static str,
        missing: &'static str,
    },

    #[error("No credentials configured. Set ANYTHING_LLM_USERNAME and ANYTHING_LLM_PASSWORD")]
    MissingCredentials,

    #[error(transparent)]
    InvalidDeploymentMode(#[from] ParseDeploymentModeError),

    #[error("Both ANYTHING_LLM_DOCKER and ANYTHING_LLM_DESKTOP are set. Unset one or set ANYTHING_LLM_DEPLOYMENT_MODE")]
    AmbiguousDeploymentMode,

    #[error("Config file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Unsupported config file format: {}. Expected a .env file", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("Failed to read env file {}: {source}", path.display())]
    EnvFile {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },

    #[error("Failed to write config template {}: {source}", path.display())]
    TemplateWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to extract configuration: {0}")]
    Extract(#[from] Box<figment::Error>),
}

/// Flat view of the recognised `ANYTHING_LLM_*` keys
///
/// Mode defaults arrive typed while `.env` and process values arrive as raw
/// strings, so every field deserializes leniently.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Settings {
    #[serde(default, deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
    base_url: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    api_prefix: String,
    #[serde(deserialize_with = "lenient::string")]
    login_endpoint: String,
    #[serde(deserialize_with = "lenient::string")]
    refresh_endpoint: String,
    #[serde(deserialize_with = "lenient::string")]
    validate_endpoint: String,
    #[serde(deserialize_with = "lenient::string")]
    token_header: String,
    #[serde(deserialize_with = "lenient::string")]
    token_prefix: String,
    #[serde(deserialize_with = "lenient::u64")]
    token_expiry_buffer_secs: u64,
    #[serde(deserialize_with = "lenient::u64")]
    timeout_secs: u64,
    #[serde(deserialize_with = "lenient::u32")]
    max_retries: u32,
    #[serde(deserialize_with = "lenient::u64")]
    retry_delay_ms: u64,
    #[serde(deserialize_with = "lenient::bool")]
    verify_ssl: bool,
    #[serde(deserialize_with = "lenient::bool")]
    refresh_supported: bool,
    #[serde(default, deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
    username: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
    password: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
    token: Option<String>,
}

impl Settings {
    fn for_mode(mode: DeploymentMode) -> Self {
        let defaults = Config::for_mode(mode);
        Self {
            base_url: mode.default_base_url().map(str::to_string),
            api_prefix: defaults.api_prefix,
            login_endpoint: defaults.login_endpoint,
            refresh_endpoint: defaults.refresh_endpoint,
            validate_endpoint: defaults.validate_endpoint,
            token_header: defaults.token_header,
            token_prefix: defaults.token_prefix,
            token_expiry_buffer_secs: defaults.token_expiry_buffer_secs,
            timeout_secs: defaults.timeout_secs,
            max_retries: defaults.max_retries,
            retry_delay_ms: defaults.retry_delay_ms,
            verify_ssl: defaults.verify_ssl,
            refresh_supported: defaults.refresh_supported,
            username: None,
            password: None,
            token: None,
        }
    }

    fn into_config(self, mode: DeploymentMode) -> Result<Config, ConfigError> {
        let base_url = non_empty(self.base_url).ok_or(ConfigError::MissingBaseUrl(mode))?;

        let credentials = match (non_empty(self.username), non_empty(self.password)) {
            (Some(username), Some(password)) => Some(Credentials { username, password }),
            (None, None) => None,
            (Some(_), None) => {
                return Err(ConfigError::IncompleteCredentials {
                    present: "ANYTHING_LLM_USERNAME",
                    missing: "ANYTHING_LLM_PASSWORD",
                })
            }
            (None, Some(_)) => {
                return Err(ConfigError::IncompleteCredentials {
                    present: "ANYTHING_LLM_PASSWORD",
                    missing: "ANYTHING_LLM_USERNAME",
                })
            }
        };

        Ok(Config {
            deployment_mode: mode,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_prefix: self.api_prefix,
            login_endpoint: self.login_endpoint,
            refresh_endpoint: self.refresh_endpoint,
            validate_endpoint: self.validate_endpoint,
            token_header: self.token_header,
            token_prefix: self.token_prefix,
            token_expiry_buffer_secs: self.token_expiry_buffer_secs,
            timeout_secs: self.timeout_secs,
            max_retries: self.max_retries,
            retry_delay_ms: self.retry_delay_ms,
            verify_ssl: self.verify_ssl,
            refresh_supported: self.refresh_supported,
            credentials,
            token: non_empty(self.token),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Configuration loader with layered merging
///
/// Precedence (lowest to highest):
/// 1. Defaults of the resolved deployment mode
/// 2. An optional `.env` template file (`ANYTHING_LLM_*` keys only)
/// 3. Process environment variables (`ANYTHING_LLM_*`)
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    mode: Option<DeploymentMode>,
    env_file: Option<PathBuf>,
}

impl ConfigLoader {
    /// Loader that auto-detects the deployment mode
    pub fn new() -> Self {
        Self::default()
    }

    /// Force a deployment mode, bypassing detection
    #[must_use]
    pub fn with_mode(mut self, mode: DeploymentMode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Layer a `.env` file under the process environment
    #[must_use]
    pub fn with_env_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.env_file = Some(path.into());
        self
    }

    /// Load configuration from the process environment
    pub fn load() -> Result<Config, ConfigError> {
        Self::new().resolve()
    }

    /// Load configuration from a `.env` file, with the environment on top
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
        Self::new().with_env_file(path.as_ref()).resolve()
    }

    /// Resolve the deployment mode and build a validated [`Config`]
    pub fn resolve(&self) -> Result<Config, ConfigError> {
        let file_values = match &self.env_file {
            Some(path) => read_env_file(path)?,
            None => BTreeMap::new(),
        };

        let env_values = read_process_env();

        let lookup = |key: &str| -> Option<String> {
            let key = key.to_ascii_lowercase();
            env_values
                .get(&key)
                .or_else(|| file_values.get(&key))
                .cloned()
        };
        let mode = match self.mode {
            Some(mode) => mode,
            None => detect_mode_with(lookup)?,
        };
        debug!(mode = %mode, explicit = self.mode.is_some(), "resolved deployment mode");

        let settings: Settings = Figment::new()
            .merge(Serialized::defaults(Settings::for_mode(mode)))
            .merge(Serialized::defaults(&file_values))
            .merge(Serialized::defaults(&env_values))
            .extract()
            .map_err(Box::new)?;

        let config = settings.into_config(mode)?;
        Self::validate(&config)?;

        info!(
            mode = %config.deployment_mode,
            base_url = %config.base_url,
            timeout_secs = config.timeout_secs,
            has_credentials = config.credentials.is_some(),
            has_static_token = config.token.is_some(),
            "configuration loaded"
        );
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.base_url.trim().is_empty() {
            return Err(ConfigError::MissingBaseUrl(config.deployment_mode));
        }

        if !(config.base_url.starts_with("http://") || config.base_url.starts_with("https://")) {
            return Err(ConfigError::InvalidBaseUrl(config.base_url.clone()));
        }

        let parsed = url::Url::parse(&config.base_url)
            .map_err(|_| ConfigError::InvalidBaseUrl(config.base_url.clone()))?;
        if parsed.host_str().is_none() {
            return Err(ConfigError::InvalidBaseUrl(config.base_url.clone()));
        }

        if config.timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout(config.timeout_secs));
        }

        if reqwest::header::HeaderName::from_bytes(config.token_header.as_bytes()).is_err() {
            return Err(ConfigError::InvalidTokenHeader(config.token_header.clone()));
        }

        Ok(())
    }
}

/// Detect the deployment mode from the process environment
///
/// `ANYTHING_LLM_DEPLOYMENT_MODE` wins. Otherwise a set `ANYTHING_LLM_DOCKER`
/// means Docker and a set `ANYTHING_LLM_DESKTOP` means Desktop; both set is
/// [`ConfigError::AmbiguousDeploymentMode`]. With neither flag the mode is
/// Desktop.
pub fn detect_deployment_mode() -> Result<DeploymentMode, ConfigError> {
    detect_mode_with(|key| std::env::var(format!("{ENV_PREFIX}{key}")).ok())
}

fn detect_mode_with(lookup: impl Fn(&str) -> Option<String>) -> Result<DeploymentMode, ConfigError> {
    if let Some(explicit) = lookup("DEPLOYMENT_MODE").filter(|v| !v.trim().is_empty()) {
        return Ok(explicit.parse()?);
    }

    let docker = lookup("DOCKER").is_some_and(|v| is_set(&v));
    let desktop = lookup("DESKTOP").is_some_and(|v| is_set(&v));

    match (docker, desktop) {
        (true, true) => Err(ConfigError::AmbiguousDeploymentMode),
        (true, false) => Ok(DeploymentMode::Docker),
        (false, _) => Ok(DeploymentMode::Desktop),
    }
}

/// A flag counts as set unless it is empty or an explicit "off" value
fn is_set(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "" | "0" | "false" | "no" | "off"
    )
}

/// `ANYTHING_LLM_*` process variables, unparsed, keyed without the prefix
///
/// Values stay verbatim strings so secrets such as `007` reach [`Config`]
/// unchanged. Non-UTF-8 variables are skipped.
fn read_process_env() -> BTreeMap<String, String> {
    std::env::vars_os()
        .filter_map(|(key, value)| {
            let key = key.into_string().ok()?;
            let stripped = key.strip_prefix(ENV_PREFIX)?.to_ascii_lowercase();
            Some((stripped, value.into_string().ok()?))
        })
        .collect()
}

/// Read the `ANYTHING_LLM_*` entries of a `.env` file, keyed without the prefix
fn read_env_file(path: &Path) -> Result<BTreeMap<String, String>, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.to_path_buf()));
    }

    let is_env_file = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n == ".env" || n.ends_with(".env"));
    if !is_env_file {
        return Err(ConfigError::UnsupportedFormat(path.to_path_buf()));
    }

    let entries = dotenvy::from_path_iter(path).map_err(|source| ConfigError::EnvFile {
        path: path.to_path_buf(),
        source,
    })?;

    let mut values = BTreeMap::new();
    for entry in entries {
        let (key, value) = entry.map_err(|source| ConfigError::EnvFile {
            path: path.to_path_buf(),
            source,
        })?;
        if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
            values.insert(stripped.to_ascii_lowercase(), value);
        }
    }

    debug!(path = %path.display(), keys = values.len(), "read env file");
    Ok(values)
}

/// Deserializers accepting either native scalars or their string spelling
mod lenient {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Bool(bool),
        Unsigned(u64),
        Signed(i64),
        Float(f64),
        Text(String),
    }

    impl Scalar {
        fn into_text(self) -> String {
            match self {
                Self::Bool(b) => b.to_string(),
                Self::Unsigned(n) => n.to_string(),
                Self::Signed(n) => n.to_string(),
                Self::Float(n) => n.to_string(),
                Self::Text(s) => s,
            }
        }
    }

    pub fn string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        Ok(Scalar::deserialize(d)?.into_text())
    }

    pub fn opt_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(Option::<Scalar>::deserialize(d)?.map(Scalar::into_text))
    }

    pub fn u64<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
        match Scalar::deserialize(d)? {
            Scalar::Unsigned(n) => Ok(n),
            Scalar::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| D::Error::custom(format!("expected a non-negative integer, got {s:?}"))),
            other => Err(D::Error::custom(format!(
                "expected a non-negative integer, got {:?}",
                other.into_text()
            ))),
        }
    }

    pub fn u32<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
        let n = u64(d)?;
        u32::try_from(n).map_err(|_| D::Error::custom(format!("{n} is out of range")))
    }

    pub fn bool<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
        match Scalar::deserialize(d)? {
            Scalar::Bool(b) => Ok(b),
            Scalar::Unsigned(n) => Ok(n != 0),
            Scalar::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Ok(true),
                "false" | "0" | "no" | "off" => Ok(false),
                _ => Err(D::Error::custom(format!("expected a boolean, got {s:?}"))),
            },
            other => Err(D::Error::custom(format!(
                "expected a boolean, got {:?}",
                other.into_text()
            ))),
        }
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Where the AnythingLLM instance runs
///
/// The mode selects the default connection parameters (base URL, timeout,
/// TLS verification, retry delay) and whether the instance issues refresh
/// tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentMode {
    /// Self-hosted container, usually exposed on port 3001
    Docker,
    /// Desktop application authenticated with a static API key
    #[default]
    Desktop,
    /// Hosted instance reachable over HTTPS
    Cloud,
}

impl DeploymentMode {
    /// All deployment modes, in detection-precedence order
    pub const ALL: [Self; 3] = [Self::Docker, Self::Desktop, Self::Cloud];

    /// Lowercase name used in environment variables and templates
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Docker => "docker",
            Self::Desktop => "desktop",
            Self::Cloud => "cloud",
        }
    }

    /// Default base URL, if the mode has a well-known local address
    pub const fn default_base_url(self) -> Option<&'static str> {
        match self {
            Self::Docker | Self::Desktop => Some("http://localhost:3001"),
            Self::Cloud => None,
        }
    }

    /// Default request timeout in seconds
    pub const fn default_timeout_secs(self) -> u64 {
        match self {
            Self::Desktop => 60,
            Self::Docker | Self::Cloud => 30,
        }
    }

    /// Whether TLS certificates are verified by default
    ///
    /// Docker instances commonly run with self-signed certificates.
    pub const fn default_verify_ssl(self) -> bool {
        !matches!(self, Self::Docker)
    }

    /// Default delay before the first retry, in milliseconds
    pub const fn default_retry_delay_ms(self) -> u64 {
        match self {
            Self::Cloud => 2_000,
            Self::Docker | Self::Desktop => 1_000,
        }
    }

    /// Whether the deployment issues refresh tokens
    ///
    /// Desktop installs authenticate with a static API key that cannot be
    /// refreshed.
    pub const fn supports_refresh(self) -> bool {
        !matches!(self, Self::Desktop)
    }
}

impl fmt::Display for DeploymentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string does not name a deployment mode
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid deployment mode: {0}. Must be one of: docker, desktop, cloud")]
pub struct ParseDeploymentModeError(pub String);

impl FromStr for DeploymentMode {
    type Err = ParseDeploymentModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "docker" => Ok(Self::Docker),
            "desktop" => Ok(Self::Desktop),
            "cloud" => Ok(Self::Cloud),
            _ => Err(ParseDeploymentModeError(s.to_string())),
        }
    }
}

/// Result of probing a running instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceType {
    /// The instance reported (or looks like) a Docker deployment
    Docker,
    /// The instance reported (or looks like) a Desktop deployment
    Desktop,
    /// No indicator matched
    Unknown,
}

impl InstanceType {
    /// The deployment mode this instance type corresponds to, if any
    pub const fn deployment_mode(self) -> Option<DeploymentMode> {
        match self {
            Self::Docker => Some(DeploymentMode::Docker),
            Self::Desktop => Some(DeploymentMode::Desktop),
            Self::Unknown => None,
        }
    }
}

impl fmt::Display for InstanceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Docker => "docker",
            Self::Desktop => "desktop",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

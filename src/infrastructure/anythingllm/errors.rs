use reqwest::StatusCode;
use thiserror::Error;

use crate::infrastructure::config::ConfigError;

/// Errors that can occur when authenticating against or calling the AnythingLLM API
#[derive(Error, Debug)]
pub enum AuthError {
    /// Missing, malformed or ambiguous configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Bad credentials, or an expired/invalid token with no refresh path
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Transport-level failure (DNS, connect, TLS, timeout)
    #[error("Connection error: {0}")]
    Connection(#[from] reqwest::Error),

    /// Non-2xx response
    #[error("API error ({status}): {body}")]
    Api {
        /// HTTP status returned by the server
        status: StatusCode,
        /// Response body, with secrets scrubbed
        body: String,
    },

    /// Operation not available for this deployment (e.g. refresh on Desktop)
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The HTTP client could not be constructed
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    /// The health check could not reach the instance
    #[error("Instance detection failed: {0}")]
    InstanceDetection(String),
}

impl AuthError {
    /// Returns true if this error is transient and the call may be retried
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Connection(_) => true,
            Self::Api { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            _ => false,
        }
    }

    /// Returns true for authentication failures
    pub const fn is_authentication(&self) -> bool {
        matches!(self, Self::Authentication(_))
    }

    /// HTTP status attached to the error, if any
    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Connection(err) => err.status(),
            _ => None,
        }
    }
}

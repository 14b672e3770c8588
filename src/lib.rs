//! anythingllm-auth - bearer token authentication for AnythingLLM
//!
//! A small client library for talking to an AnythingLLM instance running
//! under Docker, on the Desktop app, or in the cloud. Configuration is read
//! once from `ANYTHING_LLM_*` environment variables (optionally layered over a
//! `.env` template), and a [`Session`] shares that configuration and a single
//! token between blocking and async clients.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): configuration, deployment modes, tokens
//! - **Infrastructure Layer** (`infrastructure`): config loading, logging and
//!   the HTTP clients
//!
//! # Example
//!
//! ```no_run
//! use anythingllm_auth::{ConfigLoader, Session};
//!
//! # fn main() -> Result<(), anythingllm_auth::AuthError> {
//! let session = Session::new(ConfigLoader::load()?)?;
//! let client = session.client()?;
//!
//! client.authenticate("admin", "secret")?;
//! let documents = client.get("/v1/documents")?;
//! println!("{}", documents.text());
//! # Ok(())
//! # }
//! ```

pub mod domain;
pub mod infrastructure;

// Re-export commonly used types for convenience
pub use domain::models::{mask_secret, Config, Credentials, DeploymentMode, InstanceType, Token};
pub use infrastructure::anythingllm::{
    detect_instance_type, detect_instance_type_async, ApiClient, ApiResponse,
    AsyncApiClient, AsyncAuthenticator, AuthError, Authenticator, RetryPolicy, Session,
    TokenStore,
};
pub use infrastructure::config::{
    detect_deployment_mode, ConfigError, ConfigLoader, ConfigTemplate,
};
pub use infrastructure::logging::{LogConfig, LogFormat, LoggerImpl};

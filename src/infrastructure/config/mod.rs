//! Configuration management infrastructure
//!
//! Layered configuration using figment:
//! - Deployment mode detection (Docker / Desktop / Cloud)
//! - `.env` template loading and rendering
//! - Environment variable overrides
//! - Eager validation

pub mod loader;
pub mod templates;

pub use loader::{detect_deployment_mode, ConfigError, ConfigLoader, ENV_PREFIX};
pub use templates::ConfigTemplate;

//! Domain models
//!
//! Plain data types shared by the configuration layer and the API clients.

pub mod config;
pub mod deployment;
pub mod token;

pub use config::{Config, Credentials};
pub use deployment::{DeploymentMode, InstanceType, ParseDeploymentModeError};
pub use token::{mask_secret, Token};

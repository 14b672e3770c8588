//! Infrastructure layer module
//!
//! Everything that touches the outside world:
//! - Configuration from environment variables and `.env` templates
//! - Logging infrastructure
//! - The AnythingLLM HTTP clients

pub mod anythingllm;
pub mod config;
pub mod logging;

//! AnythingLLM API client
//!
//! Blocking and async clients over one shared [`Session`]:
//! - Login, validation and refresh of bearer tokens
//! - Single refresh-and-retry on 401, with at most one refresh in flight
//! - Instance type detection via the health endpoint
//! - Opt-in exponential backoff for transient failures

pub mod auth;
pub mod client;
pub mod detection;
pub mod errors;
mod protocol;
pub mod retry;
pub mod session;
pub mod token_store;
pub mod transport;

pub use auth::{AsyncAuthenticator, Authenticator};
pub use client::{ApiClient, AsyncApiClient};
pub use detection::{
    detect_instance_type, detect_instance_type_async, detect_with, detect_with_async,
    DEFAULT_DETECTION_TIMEOUT,
};
pub use errors::AuthError;
pub use retry::RetryPolicy;
pub use session::Session;
pub use token_store::TokenStore;
pub use transport::{
    ApiResponse, AsyncTransport, BlockingTransport, PreparedRequest, ReqwestAsyncTransport,
    ReqwestBlockingTransport, TransportSettings,
};

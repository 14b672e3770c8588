//! HTTP execution contexts
//!
//! Requests are built once by [`protocol`](super::protocol) as a
//! [`PreparedRequest`] and handed to either a [`BlockingTransport`] or an
//! [`AsyncTransport`]. The reqwest-backed implementations are the defaults;
//! tests and embedders can supply their own.

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, instrument};

use super::errors::AuthError;
use crate::domain::models::Config;

/// User agent sent with every request
const USER_AGENT: &str = concat!("anythingllm-auth/", env!("CARGO_PKG_VERSION"));

/// A fully built request, independent of the execution context
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    /// HTTP method
    pub method: Method,
    /// Absolute URL
    pub url: String,
    /// Headers, including the token header when authenticated
    pub headers: HeaderMap,
    /// JSON body, if any
    pub body: Option<serde_json::Value>,
}

impl PreparedRequest {
    /// Request without a body or extra headers
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// Attach a JSON body
    #[must_use]
    pub fn with_json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// A fully read response
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: String,
}

impl ApiResponse {
    /// Assemble a response
    pub const fn new(status: StatusCode, headers: HeaderMap, body: String) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// HTTP status
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Response headers
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Body as text
    pub fn text(&self) -> &str {
        &self.body
    }

    /// Consume the response, returning the body
    pub fn into_text(self) -> String {
        self.body
    }

    /// Decode the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, AuthError> {
        Ok(serde_json::from_str(&self.body)?)
    }

    /// Whether the status is 2xx
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Blocking execution context
pub trait BlockingTransport: Send + Sync {
    /// Send the request and read the whole response
    fn execute(&self, request: &PreparedRequest) -> Result<ApiResponse, AuthError>;
}

/// Non-blocking execution context
#[async_trait]
pub trait AsyncTransport: Send + Sync {
    /// Send the request and read the whole response
    async fn execute(&self, request: &PreparedRequest) -> Result<ApiResponse, AuthError>;
}

/// Connection settings shared by both reqwest transports
#[derive(Debug, Clone, Copy)]
pub struct TransportSettings {
    /// Per-request timeout
    pub timeout: Duration,
    /// Verify TLS certificates
    pub verify_ssl: bool,
}

impl From<&Config> for TransportSettings {
    fn from(config: &Config) -> Self {
        Self {
            timeout: config.timeout(),
            verify_ssl: config.verify_ssl,
        }
    }
}

/// [`BlockingTransport`] backed by `reqwest::blocking`
///
/// Like `reqwest::blocking` itself, this must not be driven from inside an
/// async runtime.
#[derive(Debug, Clone)]
pub struct ReqwestBlockingTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestBlockingTransport {
    /// Build a client from the given settings
    pub fn new(settings: TransportSettings) -> Result<Self, AuthError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(settings.timeout)
            .user_agent(USER_AGENT)
            .danger_accept_invalid_certs(!settings.verify_ssl)
            .pool_max_idle_per_host(10)
            .tcp_nodelay(true)
            .build()
            .map_err(AuthError::ClientBuild)?;
        Ok(Self { client })
    }
}

impl BlockingTransport for ReqwestBlockingTransport {
    #[instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
    fn execute(&self, request: &PreparedRequest) -> Result<ApiResponse, AuthError> {
        let mut builder = self
            .client
            .request(request.method.clone(), &request.url)
            .headers(request.headers.clone());
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send()?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text()?;

        debug!(status = %status, "response received");
        Ok(ApiResponse::new(status, headers, body))
    }
}

/// [`AsyncTransport`] backed by `reqwest`
#[derive(Debug, Clone)]
pub struct ReqwestAsyncTransport {
    client: reqwest::Client,
}

impl ReqwestAsyncTransport {
    /// Build a client from the given settings
    pub fn new(settings: TransportSettings) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .user_agent(USER_AGENT)
            .danger_accept_invalid_certs(!settings.verify_ssl)
            .pool_max_idle_per_host(10)
            .tcp_nodelay(true)
            .build()
            .map_err(AuthError::ClientBuild)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl AsyncTransport for ReqwestAsyncTransport {
    #[instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
    async fn execute(&self, request: &PreparedRequest) -> Result<ApiResponse, AuthError> {
        let mut builder = self
            .client
            .request(request.method.clone(), &request.url)
            .headers(request.headers.clone());
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await?;

        debug!(status = %status, "response received");
        Ok(ApiResponse::new(status, headers, body))
    }
}

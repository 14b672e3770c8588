use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use super::auth::{AsyncAuthenticator, Authenticator};
use super::errors::AuthError;
use super::protocol::{self, Outcome};
use super::session::Session;
use super::transport::ApiResponse;
use crate::domain::models::{Config, Token};

/// Decide what to do with the 401 raised by a first attempt
///
/// Returns the original error when a refresh cannot help, so callers surface
/// it unchanged.
fn refresh_refused(unauthorized: AuthError, refresh_error: AuthError) -> AuthError {
    match refresh_error {
        AuthError::Connection(_) | AuthError::Json(_) | AuthError::Api { .. } => refresh_error,
        other => {
            warn!(error = %other, "refresh after 401 failed");
            unauthorized
        }
    }
}

fn second_unauthorized(err: AuthError) -> AuthError {
    match err {
        AuthError::Authentication(msg) => {
            AuthError::Authentication(format!("still unauthorized after token refresh: {msg}"))
        }
        other => other,
    }
}

/// Blocking client for the AnythingLLM REST API
///
/// Every request carries the session's token. A 401 triggers one refresh
/// (shared with any concurrent caller) and one retry when the deployment
/// supports refresh.
#[derive(Debug, Clone)]
pub struct ApiClient {
    auth: Authenticator,
}

impl ApiClient {
    /// Wrap an authenticator
    pub const fn new(auth: Authenticator) -> Self {
        Self { auth }
    }

    /// Client over a fresh session for `config`
    pub fn from_config(config: Config) -> Result<Self, AuthError> {
        Session::new(config)?.client()
    }

    /// Client over a fresh session configured from the environment
    pub fn from_env() -> Result<Self, AuthError> {
        Session::from_env()?.client()
    }

    /// The authenticator backing this client
    pub const fn auth(&self) -> &Authenticator {
        &self.auth
    }

    /// Log in and store the token for subsequent requests
    pub fn authenticate(&self, username: &str, password: &str) -> Result<Token, AuthError> {
        self.auth.authenticate(username, password)
    }

    /// GET `path`
    pub fn get(&self, path: &str) -> Result<ApiResponse, AuthError> {
        self.request(Method::GET, path, None)
    }

    /// POST `body` as JSON to `path`
    pub fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<ApiResponse, AuthError> {
        self.request(Method::POST, path, Some(serde_json::to_value(body)?))
    }

    /// PUT `body` as JSON to `path`
    pub fn put<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<ApiResponse, AuthError> {
        self.request(Method::PUT, path, Some(serde_json::to_value(body)?))
    }

    /// DELETE `path`
    pub fn delete(&self, path: &str) -> Result<ApiResponse, AuthError> {
        self.request(Method::DELETE, path, None)
    }

    /// Send an authenticated request
    #[instrument(skip(self, body), fields(method = %method))]
    pub fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<ApiResponse, AuthError> {
        let config = self.auth.config();
        let (token, generation) = self.auth.ensure_token()?;

        let request =
            protocol::authorized_request(config, method.clone(), path, body.as_ref(), &token)?;
        let unauthorized = match protocol::classify(self.auth.transport().execute(&request)?) {
            Outcome::Success(response) => return Ok(response),
            Outcome::Failed(err) => return Err(err),
            Outcome::Unauthorized(err) => err,
        };

        if !config.refresh_supported {
            return Err(unauthorized);
        }

        debug!("401 received, refreshing token and retrying once");
        let token = match self.auth.refresh_after(generation) {
            Ok((token, _)) => token,
            Err(err) => return Err(refresh_refused(unauthorized, err)),
        };

        let retry = protocol::authorized_request(config, method, path, body.as_ref(), &token)?;
        match protocol::classify(self.auth.transport().execute(&retry)?) {
            Outcome::Success(response) => Ok(response),
            Outcome::Unauthorized(err) => Err(second_unauthorized(err)),
            Outcome::Failed(err) => Err(err),
        }
    }
}

/// Async client for the AnythingLLM REST API
///
/// Mirrors [`ApiClient`]; both can share one [`Session`].
#[derive(Debug, Clone)]
pub struct AsyncApiClient {
    auth: AsyncAuthenticator,
}

impl AsyncApiClient {
    /// Wrap an authenticator
    pub const fn new(auth: AsyncAuthenticator) -> Self {
        Self { auth }
    }

    /// Client over a fresh session for `config`
    pub fn from_config(config: Config) -> Result<Self, AuthError> {
        Session::new(config)?.async_client()
    }

    /// Client over a fresh session configured from the environment
    pub fn from_env() -> Result<Self, AuthError> {
        Session::from_env()?.async_client()
    }

    /// The authenticator backing this client
    pub const fn auth(&self) -> &AsyncAuthenticator {
        &self.auth
    }

    /// Log in and store the token for subsequent requests
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<Token, AuthError> {
        self.auth.authenticate(username, password).await
    }

    /// GET `path`
    pub async fn get(&self, path: &str) -> Result<ApiResponse, AuthError> {
        self.request(Method::GET, path, None).await
    }

    /// POST `body` as JSON to `path`
    pub async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<ApiResponse, AuthError> {
        let body = serde_json::to_value(body)?;
        self.request(Method::POST, path, Some(body)).await
    }

    /// PUT `body` as JSON to `path`
    pub async fn put<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<ApiResponse, AuthError> {
        let body = serde_json::to_value(body)?;
        self.request(Method::PUT, path, Some(body)).await
    }

    /// DELETE `path`
    pub async fn delete(&self, path: &str) -> Result<ApiResponse, AuthError> {
        self.request(Method::DELETE, path, None).await
    }

    /// Send an authenticated request
    #[instrument(skip(self, body), fields(method = %method))]
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<ApiResponse, AuthError> {
        let config = self.auth.config();
        let (token, generation) = self.auth.ensure_token().await?;

        let request =
            protocol::authorized_request(config, method.clone(), path, body.as_ref(), &token)?;
        let response = self.auth.transport().execute(&request).await?;
        let unauthorized = match protocol::classify(response) {
            Outcome::Success(response) => return Ok(response),
            Outcome::Failed(err) => return Err(err),
            Outcome::Unauthorized(err) => err,
        };

        if !config.refresh_supported {
            return Err(unauthorized);
        }

        debug!("401 received, refreshing token and retrying once");
        let token = match self.auth.refresh_after(generation).await {
            Ok((token, _)) => token,
            Err(err) => return Err(refresh_refused(unauthorized, err)),
        };

        let retry = protocol::authorized_request(config, method, path, body.as_ref(), &token)?;
        let response = self.auth.transport().execute(&retry).await?;
        match protocol::classify(response) {
            Outcome::Success(response) => Ok(response),
            Outcome::Unauthorized(err) => Err(second_unauthorized(err)),
            Outcome::Failed(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_refresh_refused_keeps_original_401() {
        let original = AuthError::Authentication("Request unauthorized (401)".to_string());
        let err = refresh_refused(
            original,
            AuthError::Authentication("No refresh token available".to_string()),
        );
        assert!(matches!(err, AuthError::Authentication(msg) if msg.contains("401")));
    }

    #[test]
    fn test_refresh_refused_surfaces_server_failure() {
        let err = refresh_refused(
            AuthError::Authentication("Request unauthorized (401)".to_string()),
            AuthError::Api {
                status: StatusCode::BAD_GATEWAY,
                body: String::new(),
            },
        );
        assert_eq!(err.status_code(), Some(StatusCode::BAD_GATEWAY));
    }

    #[test]
    fn test_second_unauthorized_message() {
        let err = second_unauthorized(AuthError::Authentication("expired".to_string()));
        assert!(err.to_string().contains("still unauthorized after token refresh"));
    }
}

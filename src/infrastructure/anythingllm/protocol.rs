//! Request building and response interpretation shared by the blocking and
//! async clients
//!
//! Nothing here performs I/O: each operation is a pair of "build the request"
//! and "interpret the response" functions, and the drivers in
//! [`auth`](super::auth) and [`client`](super::client) only differ in how
//! they execute the request in between.

use reqwest::header::{HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::json;

use super::errors::AuthError;
use super::transport::{ApiResponse, PreparedRequest};
use crate::domain::models::{Config, Credentials, Token};
use crate::infrastructure::config::ConfigError;
use crate::infrastructure::logging::SecretScrubber;

/// Body of a successful login or refresh
#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: Option<String>,
    #[serde(rename = "refreshToken")]
    refresh_token: Option<String>,
}

/// Token set returned by login or refresh
#[derive(Debug)]
pub(crate) struct IssuedTokens {
    pub token: Token,
    pub refresh_token: Option<String>,
}

/// How a response to an authenticated request should be handled
#[derive(Debug)]
pub(crate) enum Outcome {
    /// 2xx
    Success(ApiResponse),
    /// 401; the error is surfaced as-is when no refresh is possible
    Unauthorized(AuthError),
    /// Any other non-2xx
    Failed(AuthError),
}

pub(crate) fn login_request(config: &Config, credentials: &Credentials) -> PreparedRequest {
    PreparedRequest::new(Method::POST, config.endpoint_url(&config.login_endpoint)).with_json(
        json!({
            "username": credentials.username,
            "password": credentials.password,
        }),
    )
}

pub(crate) fn parse_login_response(response: &ApiResponse) -> Result<IssuedTokens, AuthError> {
    match response.status() {
        status if status.is_success() => {
            let body: TokenResponse = response.json()?;
            let token = body
                .token
                .filter(|t| !t.is_empty())
                .ok_or_else(|| AuthError::Authentication("No token received in response".to_string()))?;
            Ok(IssuedTokens {
                token: Token::new(token),
                refresh_token: body.refresh_token.filter(|t| !t.is_empty()),
            })
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(AuthError::Authentication(
            "Invalid username or password".to_string(),
        )),
        status => Err(api_error(status, response)),
    }
}

pub(crate) fn refresh_request(config: &Config, refresh_token: &str) -> PreparedRequest {
    PreparedRequest::new(Method::POST, config.endpoint_url(&config.refresh_endpoint))
        .with_json(json!({ "refreshToken": refresh_token }))
}

/// Interpret a refresh response, keeping `previous` when no new refresh token is issued
pub(crate) fn parse_refresh_response(
    response: &ApiResponse,
    previous: String,
) -> Result<IssuedTokens, AuthError> {
    match response.status() {
        status if status.is_success() => {
            let body: TokenResponse = response.json()?;
            let token = body.token.filter(|t| !t.is_empty()).ok_or_else(|| {
                AuthError::Authentication("No token received in refresh response".to_string())
            })?;
            Ok(IssuedTokens {
                token: Token::new(token),
                refresh_token: Some(body.refresh_token.filter(|t| !t.is_empty()).unwrap_or(previous)),
            })
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(AuthError::Authentication(
            "Refresh token expired or invalid".to_string(),
        )),
        status => Err(api_error(status, response)),
    }
}

pub(crate) fn validate_request(config: &Config, token: &Token) -> Result<PreparedRequest, AuthError> {
    let mut request =
        PreparedRequest::new(Method::GET, config.endpoint_url(&config.validate_endpoint));
    attach_token(config, &mut request, token)?;
    Ok(request)
}

pub(crate) fn parse_validate_response(response: &ApiResponse) -> Result<bool, AuthError> {
    match response.status() {
        status if status.is_success() => Ok(true),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(false),
        status => Err(api_error(status, response)),
    }
}

pub(crate) fn authorized_request(
    config: &Config,
    method: Method,
    path: &str,
    body: Option<&serde_json::Value>,
    token: &Token,
) -> Result<PreparedRequest, AuthError> {
    let mut request = PreparedRequest::new(method, config.endpoint_url(path));
    request.body = body.cloned();
    attach_token(config, &mut request, token)?;
    Ok(request)
}

pub(crate) fn classify(response: ApiResponse) -> Outcome {
    let status = response.status();
    if status.is_success() {
        return Outcome::Success(response);
    }

    if status == StatusCode::UNAUTHORIZED {
        let body = SecretScrubber::global().scrub_message(response.text());
        return Outcome::Unauthorized(AuthError::Authentication(if body.is_empty() {
            "Request unauthorized (401)".to_string()
        } else {
            format!("Request unauthorized (401): {body}")
        }));
    }

    Outcome::Failed(api_error(status, &response))
}

/// Error for a request made without any token
pub(crate) fn missing_token() -> AuthError {
    AuthError::Authentication("No token available; call authenticate first".to_string())
}

/// Error for a refresh on a deployment without refresh semantics
pub(crate) fn refresh_unsupported(config: &Config) -> AuthError {
    AuthError::UnsupportedOperation(format!(
        "token refresh is not supported for {} deployments",
        config.deployment_mode
    ))
}

/// Error for a refresh attempted without a refresh token
pub(crate) fn missing_refresh_token() -> AuthError {
    AuthError::Authentication("No refresh token available".to_string())
}

/// Credentials from config, for `authenticate_with_config_credentials`
pub(crate) fn configured_credentials(config: &Config) -> Result<&Credentials, AuthError> {
    config
        .credentials
        .as_ref()
        .ok_or(AuthError::Config(ConfigError::MissingCredentials))
}

fn attach_token(
    config: &Config,
    request: &mut PreparedRequest,
    token: &Token,
) -> Result<(), AuthError> {
    let name = HeaderName::from_bytes(config.token_header.as_bytes())
        .map_err(|_| ConfigError::InvalidTokenHeader(config.token_header.clone()))?;
    let mut value = HeaderValue::from_str(&config.authorization_value(token.as_str()))
        .map_err(|_| {
            AuthError::Authentication("Token contains characters not allowed in a header".to_string())
        })?;
    value.set_sensitive(true);
    request.headers.insert(name, value);
    Ok(())
}

fn api_error(status: StatusCode, response: &ApiResponse) -> AuthError {
    AuthError::Api {
        status,
        body: SecretScrubber::global().scrub_message(response.text()),
    }
}

use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::errors::AuthError;
use super::protocol;
use super::token_store::TokenStore;
use super::transport::{AsyncTransport, BlockingTransport};
use crate::domain::models::{Config, Credentials, Token};

/// Error for a token that expired and could not be refreshed
///
/// A rejected refresh becomes an authentication failure; transport and
/// server errors pass through unchanged.
fn expired_refresh_failed(err: AuthError) -> AuthError {
    warn!(error = %err, "token expired and refresh failed");
    match err {
        AuthError::Authentication(msg) => {
            AuthError::Authentication(format!("Token expired and refresh failed: {msg}"))
        }
        other => other,
    }
}

/// Blocking authenticator for an AnythingLLM instance
///
/// Holds no token of its own: every authenticator and client built from the
/// same [`Session`](super::Session) reads and writes one shared
/// [`TokenStore`].
///
/// Must not be used from inside an async runtime; use
/// [`AsyncAuthenticator`] there.
#[derive(Clone)]
pub struct Authenticator {
    config: Arc<Config>,
    tokens: Arc<TokenStore>,
    transport: Arc<dyn BlockingTransport>,
}

impl Authenticator {
    /// Create an authenticator over shared state
    pub fn new(
        config: Arc<Config>,
        tokens: Arc<TokenStore>,
        transport: Arc<dyn BlockingTransport>,
    ) -> Self {
        Self {
            config,
            tokens,
            transport,
        }
    }

    /// Exchange username and password for a token
    ///
    /// On success the token (and refresh token, when issued) is stored and
    /// returned. On failure nothing is stored.
    #[instrument(skip(self, password), fields(mode = %self.config.deployment_mode))]
    pub fn authenticate(&self, username: &str, password: &str) -> Result<Token, AuthError> {
        let credentials = Credentials::new(username, password);
        let request = protocol::login_request(&self.config, &credentials);
        let response = self.transport.execute(&request)?;
        let issued = protocol::parse_login_response(&response)?;

        self.tokens
            .replace(issued.token.clone(), issued.refresh_token);
        info!(token = %issued.token.masked(), "authenticated");
        Ok(issued.token)
    }

    /// Authenticate with the credentials from the configuration
    pub fn authenticate_with_config_credentials(&self) -> Result<Token, AuthError> {
        let credentials = protocol::configured_credentials(&self.config)?;
        self.authenticate(&credentials.username, &credentials.password)
    }

    /// Check whether a token is accepted by the server
    ///
    /// Malformed or locally expired tokens are rejected without a round
    /// trip. Never modifies the stored token.
    #[instrument(skip(self, token), fields(token = %token.masked()))]
    pub fn validate(&self, token: &Token) -> Result<bool, AuthError> {
        if !token.is_well_formed() || token.is_expired(chrono::Duration::zero()) {
            debug!("token rejected locally");
            return Ok(false);
        }

        let request = protocol::validate_request(&self.config, token)?;
        let response = self.transport.execute(&request)?;
        protocol::parse_validate_response(&response)
    }

    /// Validate the stored token, `false` when none is held
    pub fn validate_current(&self) -> Result<bool, AuthError> {
        match self.tokens.current() {
            Some(token) => self.validate(&token),
            None => Ok(false),
        }
    }

    /// Replace the stored token using the stored refresh token
    pub fn refresh(&self) -> Result<Token, AuthError> {
        self.refresh_after(self.tokens.generation())
            .map(|(token, _)| token)
    }

    /// Refresh unless a token newer than generation `seen` already exists
    ///
    /// Concurrent callers queue on the store's refresh gate; whoever gets
    /// there second picks up the first caller's result.
    #[instrument(skip(self), fields(mode = %self.config.deployment_mode))]
    pub(crate) fn refresh_after(&self, seen: u64) -> Result<(Token, u64), AuthError> {
        if !self.config.refresh_supported {
            return Err(protocol::refresh_unsupported(&self.config));
        }

        let _gate = self.tokens.lock_refresh_blocking();
        if let Some(fresh) = self.tokens.newer_than(seen) {
            debug!(generation = fresh.1, "reusing token refreshed by another caller");
            return Ok(fresh);
        }

        let refresh_token = self
            .tokens
            .refresh_token()
            .ok_or_else(protocol::missing_refresh_token)?;
        let request = protocol::refresh_request(&self.config, &refresh_token);
        let response = self.transport.execute(&request)?;
        let issued = protocol::parse_refresh_response(&response, refresh_token)?;

        let generation = self
            .tokens
            .replace(issued.token.clone(), issued.refresh_token);
        info!(token = %issued.token.masked(), generation, "token refreshed");
        Ok((issued.token, generation))
    }

    /// Token to send with the next request, and the generation it belongs to
    ///
    /// A token about to expire is refreshed first when that is possible. A
    /// failed refresh is returned instead of sending the stale token.
    pub(crate) fn ensure_token(&self) -> Result<(Token, u64), AuthError> {
        let (token, generation) = self.tokens.snapshot();
        let token = token.ok_or_else(protocol::missing_token)?;

        if token.is_expired(self.config.token_expiry_buffer())
            && self.config.refresh_supported
            && self.tokens.refresh_token().is_some()
        {
            debug!("token close to expiry, refreshing before use");
            return self
                .refresh_after(generation)
                .map_err(expired_refresh_failed);
        }

        Ok((token, generation))
    }

    /// Discard the stored token set
    pub fn logout(&self) {
        self.tokens.clear();
        info!("logged out");
    }

    /// Stored token, if any
    pub fn current_token(&self) -> Option<Token> {
        self.tokens.current()
    }

    /// Whether a token is held that is not about to expire
    pub fn is_authenticated(&self) -> bool {
        self.tokens
            .is_authenticated(self.config.token_expiry_buffer())
    }

    /// Configuration in use
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn transport(&self) -> &dyn BlockingTransport {
        self.transport.as_ref()
    }
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("config", &self.config)
            .field("tokens", &self.tokens)
            .finish_non_exhaustive()
    }
}

/// Async counterpart of [`Authenticator`]
#[derive(Clone)]
pub struct AsyncAuthenticator {
    config: Arc<Config>,
    tokens: Arc<TokenStore>,
    transport: Arc<dyn AsyncTransport>,
}

impl AsyncAuthenticator {
    /// Create an authenticator over shared state
    pub fn new(
        config: Arc<Config>,
        tokens: Arc<TokenStore>,
        transport: Arc<dyn AsyncTransport>,
    ) -> Self {
        Self {
            config,
            tokens,
            transport,
        }
    }

    /// Exchange username and password for a token
    #[instrument(skip(self, password), fields(mode = %self.config.deployment_mode))]
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<Token, AuthError> {
        let credentials = Credentials::new(username, password);
        let request = protocol::login_request(&self.config, &credentials);
        let response = self.transport.execute(&request).await?;
        let issued = protocol::parse_login_response(&response)?;

        self.tokens
            .replace(issued.token.clone(), issued.refresh_token);
        info!(token = %issued.token.masked(), "authenticated");
        Ok(issued.token)
    }

    /// Authenticate with the credentials from the configuration
    pub async fn authenticate_with_config_credentials(&self) -> Result<Token, AuthError> {
        let credentials = protocol::configured_credentials(&self.config)?;
        self.authenticate(&credentials.username, &credentials.password)
            .await
    }

    /// Check whether a token is accepted by the server
    #[instrument(skip(self, token), fields(token = %token.masked()))]
    pub async fn validate(&self, token: &Token) -> Result<bool, AuthError> {
        if !token.is_well_formed() || token.is_expired(chrono::Duration::zero()) {
            debug!("token rejected locally");
            return Ok(false);
        }

        let request = protocol::validate_request(&self.config, token)?;
        let response = self.transport.execute(&request).await?;
        protocol::parse_validate_response(&response)
    }

    /// Validate the stored token, `false` when none is held
    pub async fn validate_current(&self) -> Result<bool, AuthError> {
        match self.tokens.current() {
            Some(token) => self.validate(&token).await,
            None => Ok(false),
        }
    }

    /// Replace the stored token using the stored refresh token
    pub async fn refresh(&self) -> Result<Token, AuthError> {
        self.refresh_after(self.tokens.generation())
            .await
            .map(|(token, _)| token)
    }

    #[instrument(skip(self), fields(mode = %self.config.deployment_mode))]
    pub(crate) async fn refresh_after(&self, seen: u64) -> Result<(Token, u64), AuthError> {
        if !self.config.refresh_supported {
            return Err(protocol::refresh_unsupported(&self.config));
        }

        let _gate = self.tokens.lock_refresh().await;
        if let Some(fresh) = self.tokens.newer_than(seen) {
            debug!(generation = fresh.1, "reusing token refreshed by another caller");
            return Ok(fresh);
        }

        let refresh_token = self
            .tokens
            .refresh_token()
            .ok_or_else(protocol::missing_refresh_token)?;
        let request = protocol::refresh_request(&self.config, &refresh_token);
        let response = self.transport.execute(&request).await?;
        let issued = protocol::parse_refresh_response(&response, refresh_token)?;

        let generation = self
            .tokens
            .replace(issued.token.clone(), issued.refresh_token);
        info!(token = %issued.token.masked(), generation, "token refreshed");
        Ok((issued.token, generation))
    }

    pub(crate) async fn ensure_token(&self) -> Result<(Token, u64), AuthError> {
        let (token, generation) = self.tokens.snapshot();
        let token = token.ok_or_else(protocol::missing_token)?;

        if token.is_expired(self.config.token_expiry_buffer())
            && self.config.refresh_supported
            && self.tokens.refresh_token().is_some()
        {
            debug!("token close to expiry, refreshing before use");
            return self
                .refresh_after(generation).await
                .map_err(expired_refresh_failed);
        }

        Ok((token, generation))
    }

    /// Discard the stored token set
    pub fn logout(&self) {
        self.tokens.clear();
        info!("logged out");
    }

    /// Stored token, if any
    pub fn current_token(&self) -> Option<Token> {
        self.tokens.current()
    }

    /// Whether a token is held that is not about to expire
    pub fn is_authenticated(&self) -> bool {
        self.tokens
            .is_authenticated(self.config.token_expiry_buffer())
    }

    /// Configuration in use
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn transport(&self) -> &dyn AsyncTransport {
        self.transport.as_ref()
    }
}

impl std::fmt::Debug for AsyncAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncAuthenticator")
            .field("config", &self.config)
            .field("tokens", &self.tokens)
            .finish_non_exhaustive()
    }
}

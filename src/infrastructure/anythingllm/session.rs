use std::sync::Arc;
use tracing::debug;

use super::auth::{AsyncAuthenticator, Authenticator};
use super::client::{ApiClient, AsyncApiClient};
use super::errors::AuthError;
use super::token_store::TokenStore;
use super::transport::{
    AsyncTransport, BlockingTransport, ReqwestAsyncTransport, ReqwestBlockingTransport,
    TransportSettings,
};
use crate::domain::models::{Config, Token};
use crate::infrastructure::config::ConfigLoader;

/// One configuration and one token, shared by every client built from it
///
/// Cloning a session is cheap and keeps pointing at the same state, so a
/// blocking and an async client built from one session never authenticate
/// twice.
#[derive(Debug, Clone)]
pub struct Session {
    config: Arc<Config>,
    tokens: Arc<TokenStore>,
}

impl Session {
    /// Validate `config` and start a session
    ///
    /// A static token from the configuration (e.g. a Desktop API key) is
    /// stored right away.
    pub fn new(config: Config) -> Result<Self, AuthError> {
        ConfigLoader::validate(&config)?;

        let token = config
            .token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .map(Token::new);
        debug!(
            mode = %config.deployment_mode,
            static_token = token.is_some(),
            "session created"
        );

        Ok(Self {
            config: Arc::new(config),
            tokens: Arc::new(TokenStore::seeded(token)),
        })
    }

    /// Session configured from `ANYTHING_LLM_*` environment variables
    pub fn from_env() -> Result<Self, AuthError> {
        Self::new(ConfigLoader::load()?)
    }

    /// Shared configuration
    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    /// Shared token store
    pub fn tokens(&self) -> &Arc<TokenStore> {
        &self.tokens
    }

    /// Blocking authenticator using a reqwest transport
    pub fn authenticator(&self) -> Result<Authenticator, AuthError> {
        let transport = ReqwestBlockingTransport::new(TransportSettings::from(self.config.as_ref()))?;
        Ok(self.authenticator_with_transport(Arc::new(transport)))
    }

    /// Blocking authenticator using a caller-supplied transport
    pub fn authenticator_with_transport(
        &self,
        transport: Arc<dyn BlockingTransport>,
    ) -> Authenticator {
        Authenticator::new(Arc::clone(&self.config), Arc::clone(&self.tokens), transport)
    }

    /// Async authenticator using a reqwest transport
    pub fn async_authenticator(&self) -> Result<AsyncAuthenticator, AuthError> {
        let transport = ReqwestAsyncTransport::new(TransportSettings::from(self.config.as_ref()))?;
        Ok(self.async_authenticator_with_transport(Arc::new(transport)))
    }

    /// Async authenticator using a caller-supplied transport
    pub fn async_authenticator_with_transport(
        &self,
        transport: Arc<dyn AsyncTransport>,
    ) -> AsyncAuthenticator {
        AsyncAuthenticator::new(Arc::clone(&self.config), Arc::clone(&self.tokens), transport)
    }

    /// Blocking API client
    pub fn client(&self) -> Result<ApiClient, AuthError> {
        Ok(ApiClient::new(self.authenticator()?))
    }

    /// Blocking API client using a caller-supplied transport
    pub fn client_with_transport(&self, transport: Arc<dyn BlockingTransport>) -> ApiClient {
        ApiClient::new(self.authenticator_with_transport(transport))
    }

    /// Async API client
    pub fn async_client(&self) -> Result<AsyncApiClient, AuthError> {
        Ok(AsyncApiClient::new(self.async_authenticator()?))
    }

    /// Async API client using a caller-supplied transport
    pub fn async_client_with_transport(&self, transport: Arc<dyn AsyncTransport>) -> AsyncApiClient {
        AsyncApiClient::new(self.async_authenticator_with_transport(transport))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::DeploymentMode;
    use crate::infrastructure::config::ConfigError;

    #[test]
    fn test_session_rejects_invalid_config() {
        let err = Session::new(Config::for_mode(DeploymentMode::Cloud)).unwrap_err();
        assert!(matches!(
            err,
            AuthError::Config(ConfigError::MissingBaseUrl(DeploymentMode::Cloud))
        ));
    }

    #[test]
    fn test_session_seeds_static_token() {
        let config = Config {
            token: Some("desktop-key".to_string()),
            ..Config::for_mode(DeploymentMode::Desktop)
        };
        let session = Session::new(config).unwrap();
        assert_eq!(session.tokens().current().unwrap().as_str(), "desktop-key");
    }

    #[test]
    fn test_blank_static_token_ignored() {
        let config = Config {
            token: Some("  ".to_string()),
            ..Config::for_mode(DeploymentMode::Desktop)
        };
        let session = Session::new(config).unwrap();
        assert!(session.tokens().current().is_none());
    }

    #[test]
    fn test_clones_share_state() {
        let session = Session::new(Config::for_mode(DeploymentMode::Docker)).unwrap();
        let other = session.clone();
        session.tokens().replace(Token::new("shared"), None);

        assert!(Arc::ptr_eq(session.config(), other.config()));
        assert_eq!(other.tokens().current().unwrap().as_str(), "shared");
    }
}

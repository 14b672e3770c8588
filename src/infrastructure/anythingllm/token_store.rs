use std::fmt;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::{Mutex, MutexGuard};

use crate::domain::models::Token;

#[derive(Default)]
struct TokenState {
    token: Option<Token>,
    refresh_token: Option<String>,
    generation: u64,
}

/// Process-local home of a session's token
///
/// One store is shared (via `Arc`) by every authenticator and client of a
/// session, blocking and async alike. Every replacement or removal bumps a
/// generation counter; a caller that saw generation `n` and later needs a
/// refresh passes `n` along, so that if someone else already refreshed in the
/// meantime the new token is reused instead of refreshing again.
///
/// Refreshes are serialised by a single gate that can be taken both from
/// blocking code and from async tasks.
pub struct TokenStore {
    state: RwLock<TokenState>,
    refresh_gate: Mutex<()>,
}

impl TokenStore {
    /// Empty store
    pub fn new() -> Self {
        Self {
            state: RwLock::new(TokenState::default()),
            refresh_gate: Mutex::new(()),
        }
    }

    /// Store seeded with a static token (e.g. a Desktop API key)
    pub fn seeded(token: Option<Token>) -> Self {
        Self {
            state: RwLock::new(TokenState {
                token,
                refresh_token: None,
                generation: 0,
            }),
            refresh_gate: Mutex::new(()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, TokenState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, TokenState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current token, if any
    pub fn current(&self) -> Option<Token> {
        self.read().token.clone()
    }

    /// Current token together with the generation it belongs to
    pub fn snapshot(&self) -> (Option<Token>, u64) {
        let state = self.read();
        (state.token.clone(), state.generation)
    }

    /// Current generation
    pub fn generation(&self) -> u64 {
        self.read().generation
    }

    /// Stored refresh token, if the login response carried one
    pub fn refresh_token(&self) -> Option<String> {
        self.read().refresh_token.clone()
    }

    /// Whether a token is held that is not within `buffer` of expiring
    pub fn is_authenticated(&self, buffer: chrono::Duration) -> bool {
        self.read()
            .token
            .as_ref()
            .is_some_and(|t| !t.is_expired(buffer))
    }

    /// Replace the token set, returning the new generation
    pub fn replace(&self, token: Token, refresh_token: Option<String>) -> u64 {
        let mut state = self.write();
        state.token = Some(token);
        state.refresh_token = refresh_token;
        state.generation += 1;
        state.generation
    }

    /// Discard the token set
    pub fn clear(&self) {
        let mut state = self.write();
        state.token = None;
        state.refresh_token = None;
        state.generation += 1;
    }

    /// The current token and its generation, if stored after generation `seen`
    pub(crate) fn newer_than(&self, seen: u64) -> Option<(Token, u64)> {
        let state = self.read();
        if state.generation > seen {
            state.token.clone().map(|token| (token, state.generation))
        } else {
            None
        }
    }

    /// Take the refresh gate from blocking code
    ///
    /// Panics if called from within an async execution context, like
    /// `tokio::sync::Mutex::blocking_lock`.
    pub(crate) fn lock_refresh_blocking(&self) -> MutexGuard<'_, ()> {
        self.refresh_gate.blocking_lock()
    }

    /// Take the refresh gate from an async task
    pub(crate) async fn lock_refresh(&self) -> MutexGuard<'_, ()> {
        self.refresh_gate.lock().await
    }
}

impl Default for TokenStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.read();
        f.debug_struct("TokenStore")
            .field("token", &state.token)
            .field("has_refresh_token", &state.refresh_token.is_some())
            .field("generation", &state.generation)
            .finish()
    }
}

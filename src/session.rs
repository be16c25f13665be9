//! Session context handed to the API client.
//!
//! Holds the bearer/refresh token pair and the signed-in user. Created once per
//! console run (or per test) and shared through an `Arc`; sign-in and
//! sign-out are explicit.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use tracing::info;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::config::AppConfig;
use crate::models::UserProfile;

/// Token pair issued by the auth endpoints. Wiped from memory when dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthTokens {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl std::fmt::Debug for AuthTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthTokens")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

#[derive(Default)]
struct SessionState {
    tokens: Option<AuthTokens>,
    user: Option<UserProfile>,
}

/// Public view of the session for display.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub authenticated: bool,
    pub has_refresh_token: bool,
    pub user: Option<UserProfile>,
}

#[derive(Default)]
pub struct Session {
    state: RwLock<SessionState>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Session pre-seeded from configured tokens, if any.
    pub fn from_config(config: &AppConfig) -> Self {
        let session = Self::new();
        if let Some(access_token) = config.access_token.clone() {
            session.sign_in(
                AuthTokens {
                    access_token,
                    refresh_token: config.refresh_token.clone(),
                },
                None,
            );
        }
        session
    }

    fn read(&self) -> RwLockReadGuard<'_, SessionState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn sign_in(&self, tokens: AuthTokens, user: Option<UserProfile>) {
        let mut state = self.write();
        state.tokens = Some(tokens);
        if user.is_some() {
            state.user = user;
        }
    }

    /// Replace tokens after a refresh, keeping the refresh token when the
    /// server did not rotate it.
    pub fn update_tokens(&self, mut tokens: AuthTokens) {
        let mut state = self.write();
        if tokens.refresh_token.is_none() {
            tokens.refresh_token = state
                .tokens
                .as_ref()
                .and_then(|current| current.refresh_token.clone());
        }
        state.tokens = Some(tokens);
    }

    pub fn sign_out(&self) {
        let mut state = self.write();
        if state.tokens.take().is_some() {
            info!("session cleared");
        }
        state.user = None;
    }

    pub fn access_token(&self) -> Option<String> {
        self.read().tokens.as_ref().map(|t| t.access_token.clone())
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.read()
            .tokens
            .as_ref()
            .and_then(|t| t.refresh_token.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.read().tokens.is_some()
    }

    pub fn user(&self) -> Option<UserProfile> {
        self.read().user.clone()
    }

    pub fn summary(&self) -> SessionSummary {
        let state = self.read();
        SessionSummary {
            authenticated: state.tokens.is_some(),
            has_refresh_token: state
                .tokens
                .as_ref()
                .is_some_and(|t| t.refresh_token.is_some()),
            user: state.user.clone(),
        }
    }
}

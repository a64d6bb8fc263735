//! Session Types and Structures

use std::fmt;
use tirumala_core::{StorageConfig, UserRecord};

/// Token and user, always held together
#[derive(Debug, Clone, PartialEq)]
pub struct Credentials {
    pub token: String,
    pub user: UserRecord,
}

/// Authentication state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    Authenticated,
}

impl fmt::Display for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthState::Unauthenticated => write!(f, "UNAUTHENTICATED"),
            AuthState::Authenticated => write!(f, "AUTHENTICATED"),
        }
    }
}

/// Snapshot of the current session
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    credentials: Option<Credentials>,
    loading: bool,
}

impl Session {
    /// State at process start: nobody logged in, restore pending
    pub fn initial() -> Self {
        Self {
            credentials: None,
            loading: true,
        }
    }

    pub(crate) fn set_credentials(&mut self, credentials: Option<Credentials>) {
        self.credentials = credentials;
    }

    pub(crate) fn credentials_mut(&mut self) -> Option<&mut Credentials> {
        self.credentials.as_mut()
    }

    pub(crate) fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }

    pub fn token(&self) -> Option<&str> {
        self.credentials.as_ref().map(|c| c.token.as_str())
    }

    pub fn user(&self) -> Option<&UserRecord> {
        self.credentials.as_ref().map(|c| &c.user)
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    /// True until the startup restore sequence has completed
    pub fn loading(&self) -> bool {
        self.loading
    }

    pub fn state(&self) -> AuthState {
        if self.credentials.is_some() {
            AuthState::Authenticated
        } else {
            AuthState::Unauthenticated
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.state() == AuthState::Authenticated
    }
}

/// Keys under which the session is persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageKeys {
    pub token: String,
    pub user: String,
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self::from(&StorageConfig::default())
    }
}

impl From<&StorageConfig> for StorageKeys {
    fn from(config: &StorageConfig) -> Self {
        Self {
            token: config.token_key.clone(),
            user: config.user_key.clone(),
        }
    }
}

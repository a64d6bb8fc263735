//! Core trait definitions

use crate::error::TirumalaResult;
use crate::user::UserRecord;
use async_trait::async_trait;
use serde::Deserialize;

/// Durable key-value storage for session credentials.
///
/// Values survive process restarts. Batch operations should be applied
/// all-or-nothing where the backend allows it.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Read a value, `None` when the key is absent
    async fn get(&self, key: &str) -> TirumalaResult<Option<String>>;

    /// Write a value
    async fn set(&self, key: &str, value: &str) -> TirumalaResult<()>;

    /// Remove a value; removing an absent key is not an error
    async fn remove(&self, key: &str) -> TirumalaResult<()>;

    /// Write several values
    async fn set_many(&self, entries: &[(&str, &str)]) -> TirumalaResult<()> {
        for (key, value) in entries {
            self.set(key, value).await?;
        }
        Ok(())
    }

    /// Remove several values
    async fn remove_many(&self, keys: &[&str]) -> TirumalaResult<()> {
        for key in keys {
            self.remove(key).await?;
        }
        Ok(())
    }
}

/// Successful credential exchange
#[derive(Debug, Clone, Deserialize)]
pub struct SignInResponse {
    pub token: String,
    pub user: UserRecord,
}

/// Remote identity service
#[async_trait]
pub trait IdentityService: Send + Sync {
    /// Validate `token` and return the canonical user record.
    ///
    /// A rejected token must surface as an authentication error; every other
    /// failure is reported with a transient error kind.
    async fn current_user(&self, token: &str) -> TirumalaResult<UserRecord>;

    /// Exchange email and password for a token and user record
    async fn sign_in(&self, email: &str, password: &str) -> TirumalaResult<SignInResponse>;
}

//! Core data type definitions

use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};

/// Top-level client configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TirumalaConfig {
    pub api: ApiConfig,
    pub storage: StorageConfig,
    pub session: SessionSettings,
    pub logging: LoggingConfig,
}

/// Remote identity service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the backend, without trailing slash
    pub base_url: String,
    /// Path of the "current user" endpoint
    pub identity_path: String,
    /// Path of the credential exchange endpoint
    pub login_path: String,
    /// Header carrying the bearer token
    pub token_header: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// User agent string
    pub user_agent: String,
}

/// Persisted credential store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the credential file (`~` is expanded)
    pub data_dir: String,
    /// Key under which the bearer token is stored
    pub token_key: String,
    /// Key under which the serialized user record is stored
    pub user_key: String,
}

/// Session manager behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Keep `loading` set until startup revalidation has finished
    pub await_revalidation: bool,
}

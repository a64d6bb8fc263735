//! Configuration management

use crate::error::{ErrorContext, TirumalaError, TirumalaResult};
use crate::types::{ApiConfig, SessionSettings, StorageConfig, TirumalaConfig};

use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable overriding `api.base_url`
pub const API_URL_ENV: &str = "TIRUMALA_API_URL";

pub const DEFAULT_TOKEN_KEY: &str = "auth_token";
pub const DEFAULT_USER_KEY: &str = "auth_user";

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://tirumla-backend.vercel.app".to_string(),
            identity_path: "/identity/me".to_string(),
            login_path: "/auth/login".to_string(),
            token_header: "Authorization-Token".to_string(),
            timeout_seconds: 25,
            user_agent: format!("tirumala/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ApiConfig {
    /// Base URL with trailing slashes removed
    pub fn normalized_base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Join the base URL with an endpoint path
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.normalized_base_url(),
            path.trim_start_matches('/')
        )
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.tirumala".to_string(),
            token_key: DEFAULT_TOKEN_KEY.to_string(),
            user_key: DEFAULT_USER_KEY.to_string(),
        }
    }
}

impl StorageConfig {
    /// Data directory with a leading `~` expanded to the home directory
    pub fn resolved_data_dir(&self) -> PathBuf {
        if let Some(rest) = self.data_dir.strip_prefix('~') {
            if let Some(home) = dirs::home_dir() {
                return home.join(rest.trim_start_matches(['/', '\\']));
            }
        }
        PathBuf::from(&self.data_dir)
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            await_revalidation: true,
        }
    }
}

impl TirumalaConfig {
    /// Load configuration from file
    pub fn from_file<P: AsRef<Path>>(path: P) -> TirumalaResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| TirumalaError::Config {
            message: format!("Failed to read config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("read_file")
                .with_suggestion("Check if the config file exists and is readable"),
        })?;

        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> TirumalaResult<Self> {
        toml::from_str(content).map_err(|e| TirumalaError::Config {
            message: format!("Failed to parse config: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("parse_toml")
                .with_suggestion("Check TOML syntax in config file"),
        })
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> TirumalaResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| TirumalaError::Config {
            message: format!("Failed to serialize config: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config").with_operation("serialize_toml"),
        })?;

        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        std::fs::write(path, content).map_err(|e| TirumalaError::Config {
            message: format!("Failed to write config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("write_file")
                .with_suggestion("Check if the directory exists and is writable"),
        })?;

        Ok(())
    }

    /// Candidate config locations, in lookup order
    pub fn default_paths() -> Vec<PathBuf> {
        [
            dirs::config_dir().map(|d| d.join("tirumala").join("config.toml")),
            dirs::home_dir().map(|d| d.join(".tirumala").join("config.toml")),
            Some(PathBuf::from("tirumala.toml")),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    /// Load from an explicit path, or the first default location that exists,
    /// or fall back to defaults. Environment overrides are applied last.
    pub fn load(explicit: Option<&Path>) -> TirumalaResult<Self> {
        let config = Self::load_unchecked(explicit)?;
        config.validate()?;
        Ok(config)
    }

    /// Same lookup as [`TirumalaConfig::load`] without validation
    pub fn load_unchecked(explicit: Option<&Path>) -> TirumalaResult<Self> {
        let mut config = match explicit {
            Some(path) => {
                info!("Loading configuration from {:?}", path);
                Self::from_file(path)?
            }
            None => match Self::default_paths().into_iter().find(|p| p.exists()) {
                Some(path) => {
                    info!("Loading configuration from {:?}", path);
                    Self::from_file(&path)?
                }
                None => {
                    debug!("No configuration file found, using defaults");
                    Self::default()
                }
            },
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                debug!(base_url = %url, "Base URL overridden from environment");
                self.api.base_url = url.trim().to_string();
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> TirumalaResult<()> {
        let base_url = self.api.normalized_base_url();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(TirumalaError::Config {
                message: format!("api.base_url must be an http(s) URL, got '{}'", base_url),
                source: None,
                context: ErrorContext::new("config")
                    .with_operation("validate")
                    .with_suggestion("Set api.base_url to e.g. https://backend.example.com"),
            });
        }

        if self.api.timeout_seconds == 0 {
            return Err(TirumalaError::Config {
                message: "api.timeout_seconds must be greater than 0".to_string(),
                source: None,
                context: ErrorContext::new("config")
                    .with_operation("validate")
                    .with_suggestion("Set api.timeout_seconds to a positive value"),
            });
        }

        if self.api.token_header.trim().is_empty() {
            return Err(TirumalaError::Config {
                message: "api.token_header must not be empty".to_string(),
                source: None,
                context: ErrorContext::new("config").with_operation("validate"),
            });
        }

        if self.storage.token_key.is_empty()
            || self.storage.user_key.is_empty()
            || self.storage.token_key == self.storage.user_key
        {
            return Err(TirumalaError::Config {
                message: "storage.token_key and storage.user_key must be distinct and non-empty"
                    .to_string(),
                source: None,
                context: ErrorContext::new("config")
                    .with_operation("validate")
                    .with_suggestion("Use the defaults 'auth_token' and 'auth_user'"),
            });
        }

        Ok(())
    }
}

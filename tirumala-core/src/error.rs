//! Unified error handling system
//!
//! Provides structured error types with context, recovery suggestions and a
//! session-oriented classification of failures.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};

pub type TirumalaResult<T> = Result<T, TirumalaError>;

/// Error context providing additional information for debugging and recovery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorContext {
    /// Unique error ID for tracking
    pub error_id: String,
    /// Timestamp when error occurred
    pub timestamp: DateTime<Utc>,
    /// Component where error originated
    pub component: String,
    /// Operation being performed when error occurred
    pub operation: Option<String>,
    /// Additional metadata
    pub metadata: std::collections::HashMap<String, String>,
    /// Recovery suggestions
    pub recovery_suggestions: Vec<String>,
}

impl ErrorContext {
    pub fn new(component: &str) -> Self {
        Self {
            error_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            component: component.to_string(),
            operation: None,
            metadata: std::collections::HashMap::new(),
            recovery_suggestions: Vec::new(),
        }
    }

    pub fn with_operation(mut self, operation: &str) -> Self {
        self.operation = Some(operation.to_string());
        self
    }

    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_suggestion(mut self, suggestion: &str) -> Self {
        self.recovery_suggestions.push(suggestion.to_string());
        self
    }
}

/// How a failure affects the current session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The identity service rejected the credential; the session must end
    Authentication,
    /// Network, timeout or malformed response; the session is kept
    Transient,
    /// Caller supplied invalid input
    Validation,
    /// Local failures such as storage or configuration problems
    Fatal,
}

/// Main error type for the Tirumala client
#[derive(Error, Debug)]
pub enum TirumalaError {
    #[error("Storage error: {message}")]
    Storage {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("Network error: {message}")]
    Network {
        message: String,
        /// HTTP status when the server answered
        status: Option<u16>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("Operation timeout: {operation}")]
    Timeout {
        operation: String,
        duration_ms: u64,
        context: ErrorContext,
    },

    #[error("Malformed response: {message}")]
    MalformedResponse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("Authentication error: {message}")]
    Authentication {
        message: String,
        context: ErrorContext,
    },

    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
        context: ErrorContext,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },
}

impl TirumalaError {
    /// Get the error context
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            TirumalaError::Storage { context, .. } => Some(context),
            TirumalaError::Config { context, .. } => Some(context),
            TirumalaError::Network { context, .. } => Some(context),
            TirumalaError::Timeout { context, .. } => Some(context),
            TirumalaError::MalformedResponse { context, .. } => Some(context),
            TirumalaError::Authentication { context, .. } => Some(context),
            TirumalaError::Validation { context, .. } => Some(context),
            TirumalaError::Internal { context, .. } => Some(context),
            TirumalaError::Io(_) | TirumalaError::Serialization(_) => None,
        }
    }

    /// Classify the error by its effect on a session
    pub fn kind(&self) -> FailureKind {
        match self {
            TirumalaError::Authentication { .. } => FailureKind::Authentication,
            TirumalaError::Network { .. }
            | TirumalaError::Timeout { .. }
            | TirumalaError::MalformedResponse { .. } => FailureKind::Transient,
            TirumalaError::Validation { .. } => FailureKind::Validation,
            _ => FailureKind::Fatal,
        }
    }

    /// True when the identity service explicitly rejected the credential
    pub fn is_auth_failure(&self) -> bool {
        self.kind() == FailureKind::Authentication
    }

    /// Check if error is recoverable
    pub fn is_recoverable(&self) -> bool {
        self.kind() == FailureKind::Transient
    }

    /// HTTP status carried by the error, if the server answered
    pub fn status(&self) -> Option<u16> {
        match self {
            TirumalaError::Network { status, .. } => *status,
            TirumalaError::Authentication { .. } => Some(401),
            _ => None,
        }
    }

    /// Log the error with appropriate level
    pub fn log(&self) {
        let error_id = self.context().map(|c| c.error_id.as_str());
        match self.kind() {
            FailureKind::Transient => {
                warn!(
                    error_id = ?error_id,
                    error = %self,
                    "Network or timeout error (session kept)"
                );
            }
            FailureKind::Authentication => {
                warn!(
                    error_id = ?error_id,
                    error = %self,
                    "Credential rejected by identity service"
                );
            }
            FailureKind::Validation => {
                error!(
                    error_id = ?error_id,
                    error = %self,
                    "Validation error"
                );
            }
            FailureKind::Fatal => {
                error!(
                    error_id = ?error_id,
                    error = %self,
                    "Error occurred"
                );
            }
        }
    }
}

/// Convenience macros for creating errors with context
#[macro_export]
macro_rules! storage_error {
    ($msg:expr, $component:expr) => {
        $crate::TirumalaError::Storage {
            message: $msg.to_string(),
            source: None,
            context: $crate::ErrorContext::new($component),
        }
    };
    ($msg:expr, $component:expr, $source:expr) => {
        $crate::TirumalaError::Storage {
            message: $msg.to_string(),
            source: Some(Box::new($source)),
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Check that the data directory exists and is writable"),
        }
    };
}

#[macro_export]
macro_rules! config_error {
    ($msg:expr, $component:expr) => {
        $crate::TirumalaError::Config {
            message: $msg.to_string(),
            source: None,
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Check your configuration file")
                .with_suggestion("Run 'tirumala config --init' to create default config"),
        }
    };
}

#[macro_export]
macro_rules! validation_error {
    ($msg:expr, $field:expr, $component:expr) => {
        $crate::TirumalaError::Validation {
            message: $msg.to_string(),
            field: Some($field.to_string()),
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Check the field value and format"),
        }
    };
}

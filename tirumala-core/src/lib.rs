//! Tirumala Core - Core data structures and trait definitions
//!
//! Errors, logging, configuration, the user record model and the storage and
//! identity-service abstractions shared by the session crate and the CLI.

pub mod config;
pub mod error;
pub mod logging;
pub mod traits;
pub mod types;
pub mod user;

pub use config::*;
pub use error::*;
pub use logging::*;
pub use traits::*;
pub use types::*;
pub use user::*;

// Re-export commonly used external types
pub use async_trait::async_trait;
pub use tracing;

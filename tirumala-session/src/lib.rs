//! Tirumala Session - authentication session lifecycle
//!
//! Restores a persisted session at startup, revalidates it against the remote
//! identity service, and exposes login, logout and refresh as the only ways to
//! change who is logged in.

pub mod identity;
pub mod manager;
pub mod store;
pub mod types;

pub use identity::HttpIdentityService;
pub use manager::SessionManager;
pub use store::{FileCredentialStore, MemoryCredentialStore};
pub use types::*;

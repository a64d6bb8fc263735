//! Shared test doubles for session tests

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tirumala_core::{
    CredentialStore, ErrorContext, IdentityService, SessionSettings, SignInResponse, TirumalaError,
    TirumalaResult, UserRecord,
};
use tirumala_session::{MemoryCredentialStore, SessionManager, StorageKeys};
use tokio::sync::Notify;

/// Scripted answer of the identity service
pub enum Reply {
    User(Value),
    Unauthorized,
    Unreachable,
    Malformed,
}

/// Identity service double that answers from a queue.
///
/// When built with [`ScriptedIdentity::held`] every call waits for
/// [`ScriptedIdentity::release`] before answering.
#[derive(Default)]
pub struct ScriptedIdentity {
    replies: Mutex<VecDeque<Reply>>,
    tokens: Mutex<Vec<String>>,
    calls: AtomicUsize,
    hold: Option<Notify>,
}

impl ScriptedIdentity {
    pub fn new(replies: impl IntoIterator<Item = Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().collect()),
            ..Self::default()
        })
    }

    pub fn held(replies: impl IntoIterator<Item = Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().collect()),
            hold: Some(Notify::new()),
            ..Self::default()
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn tokens(&self) -> Vec<String> {
        self.tokens.lock().unwrap().clone()
    }

    /// Let one held call answer
    pub fn release(&self) {
        if let Some(hold) = &self.hold {
            hold.notify_one();
        }
    }

    /// Wait until at least `n` calls have arrived
    pub async fn wait_for_calls(&self, n: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.calls() < n {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("identity service was never called");
    }
}

#[async_trait]
impl IdentityService for ScriptedIdentity {
    async fn current_user(&self, token: &str) -> TirumalaResult<UserRecord> {
        self.tokens.lock().unwrap().push(token.to_string());
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(hold) = &self.hold {
            hold.notified().await;
        }

        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Reply::Unreachable);

        match reply {
            Reply::User(value) => UserRecord::from_value(value),
            Reply::Unauthorized => Err(TirumalaError::Authentication {
                message: "Token is not valid".to_string(),
                context: ErrorContext::new("scripted_identity"),
            }),
            Reply::Unreachable => Err(TirumalaError::Network {
                message: "connection refused".to_string(),
                status: None,
                source: None,
                context: ErrorContext::new("scripted_identity"),
            }),
            Reply::Malformed => UserRecord::from_value(Value::String("oops".to_string())),
        }
    }

    async fn sign_in(&self, _email: &str, _password: &str) -> TirumalaResult<SignInResponse> {
        Err(TirumalaError::Network {
            message: "sign in is not scripted".to_string(),
            status: None,
            source: None,
            context: ErrorContext::new("scripted_identity"),
        })
    }
}

pub fn user(value: Value) -> UserRecord {
    UserRecord::from_value(value).unwrap()
}

pub fn manager_with(
    store: &Arc<MemoryCredentialStore>,
    identity: &Arc<ScriptedIdentity>,
    settings: SessionSettings,
) -> SessionManager {
    SessionManager::new(
        store.clone(),
        identity.clone(),
        StorageKeys::default(),
        settings,
    )
}

pub fn manager(
    store: &Arc<MemoryCredentialStore>,
    identity: &Arc<ScriptedIdentity>,
) -> SessionManager {
    manager_with(store, identity, SessionSettings::default())
}

/// Store pre-populated with a persisted session
pub async fn seeded_store(token: &str, user: Value) -> Arc<MemoryCredentialStore> {
    let store = Arc::new(MemoryCredentialStore::new());
    let user_json = user.to_string();
    store
        .set_many(&[("auth_token", token), ("auth_user", user_json.as_str())])
        .await
        .unwrap();
    store
}

/// Persisted user document, parsed
pub fn persisted_user(store: &MemoryCredentialStore) -> Option<Value> {
    store
        .snapshot()
        .get("auth_user")
        .map(|raw| serde_json::from_str(raw).unwrap())
}

pub fn persisted_token(store: &MemoryCredentialStore) -> Option<String> {
    store.snapshot().get("auth_token").cloned()
}

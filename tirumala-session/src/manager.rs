//! Session Manager - process-wide authority for who is logged in
//!
//! All writes go through [`SessionManager::login`], [`SessionManager::logout`],
//! [`SessionManager::refresh`] and the startup [`SessionManager::restore`].
//! Each write persists to the credential store before publishing the new state
//! on a `watch` channel.
//!
//! Every login and logout starts a new generation. Revalidation and refresh
//! remember the generation they were issued under, and their results are
//! dropped if the session changed while the request was in flight.

use super::{
    AuthState, Credentials, FileCredentialStore, HttpIdentityService, Session, StorageKeys,
};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tirumala_core::{
    validation_error, CredentialStore, IdentityService, SessionSettings, TirumalaConfig,
    TirumalaResult, UserRecord,
};
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

struct Inner {
    store: Arc<dyn CredentialStore>,
    identity: Arc<dyn IdentityService>,
    keys: StorageKeys,
    settings: SessionSettings,
    state: watch::Sender<Session>,
    /// Only changed while `write_gate` is held
    generation: AtomicU64,
    /// Serialises persist-then-publish sections; never held across network calls
    write_gate: Mutex<()>,
    restore_started: AtomicBool,
}

/// Owner of the session state
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    /// Create a new session manager
    pub fn new(
        store: Arc<dyn CredentialStore>,
        identity: Arc<dyn IdentityService>,
        keys: StorageKeys,
        settings: SessionSettings,
    ) -> Self {
        let (state, _) = watch::channel(Session::initial());

        Self {
            inner: Arc::new(Inner {
                store,
                identity,
                keys,
                settings,
                state,
                generation: AtomicU64::new(0),
                write_gate: Mutex::new(()),
                restore_started: AtomicBool::new(false),
            }),
        }
    }

    /// Build a manager backed by the file store and HTTP identity client
    pub fn from_config(config: &TirumalaConfig) -> TirumalaResult<Self> {
        let store = FileCredentialStore::new(config.storage.resolved_data_dir());
        let identity = HttpIdentityService::new(config.api.clone())?;

        Ok(Self::new(
            Arc::new(store),
            Arc::new(identity),
            StorageKeys::from(&config.storage),
            config.session.clone(),
        ))
    }

    /// Snapshot of the current session
    pub fn session(&self) -> Session {
        self.inner.state.borrow().clone()
    }

    /// Receiver that observes every published session change
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.inner.state.subscribe()
    }

    pub fn state(&self) -> AuthState {
        self.inner.state.borrow().state()
    }

    /// Restore a persisted session and revalidate it.
    ///
    /// Runs once; later calls return immediately. Never fails: storage and
    /// transient network errors are logged and the cached session is kept.
    /// `loading` is cleared when the sequence completes, or right after the
    /// storage read when `await_revalidation` is off.
    pub async fn restore(&self) {
        self.restore_with(true).await
    }

    /// Restore the persisted session without contacting the identity service.
    ///
    /// For callers about to replace, end or explicitly refresh the session.
    /// Shares the run-once guard with [`SessionManager::restore`].
    pub async fn restore_cached(&self) {
        self.restore_with(false).await
    }

    async fn restore_with(&self, revalidate: bool) {
        if self.inner.restore_started.swap(true, Ordering::SeqCst) {
            debug!("Session restore already performed");
            return;
        }

        let generation = self.inner.generation.load(Ordering::SeqCst);
        let Some(credentials) = self.load_stored(generation).await else {
            self.finish_loading();
            return;
        };

        let token = credentials.token.clone();
        if !self.publish_restored(generation, credentials).await {
            self.finish_loading();
            return;
        }
        info!("Restored persisted session");

        if !revalidate {
            self.finish_loading();
        } else if self.inner.settings.await_revalidation {
            self.revalidate(generation, token).await;
            self.finish_loading();
        } else {
            self.finish_loading();
            let manager = self.clone();
            tokio::spawn(async move {
                manager.revalidate(generation, token).await;
            });
        }
    }

    /// Store a session obtained from a login flow and make it current
    pub async fn login(&self, token: impl Into<String>, user: UserRecord) -> TirumalaResult<()> {
        let token = token.into();
        if token.is_empty() {
            return Err(validation_error!("token must not be empty", "token", "session_manager"));
        }
        let user_json = user.to_json()?;

        let _gate = self.inner.write_gate.lock().await;
        self.inner
            .store
            .set_many(&[
                (self.inner.keys.token.as_str(), token.as_str()),
                (self.inner.keys.user.as_str(), user_json.as_str()),
            ])
            .await?;

        let user_id = user.id().map(str::to_string);
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        self.inner
            .state
            .send_modify(|session| session.set_credentials(Some(Credentials { token, user })));

        info!(user_id = ?user_id, "Logged in");
        Ok(())
    }

    /// End the session.
    ///
    /// Safe to call when already logged out. The in-memory session is cleared
    /// even if removing the persisted keys fails; that error is returned.
    pub async fn logout(&self) -> TirumalaResult<()> {
        let _gate = self.inner.write_gate.lock().await;
        self.clear_locked().await
    }

    /// Re-fetch the user record for the current token.
    ///
    /// No-op without a token. A rejected token logs the session out and
    /// resolves `Ok`; any other failure is returned with the session intact.
    pub async fn refresh(&self) -> TirumalaResult<()> {
        let (generation, token) = {
            let _gate = self.inner.write_gate.lock().await;
            let generation = self.inner.generation.load(Ordering::SeqCst);
            let token = self.inner.state.borrow().token().map(str::to_string);
            (generation, token)
        };
        let Some(token) = token else {
            debug!("Refresh skipped: no active session");
            return Ok(());
        };

        match self.inner.identity.current_user(&token).await {
            Ok(user) => {
                self.apply_user(generation, user).await?;
                Ok(())
            }
            Err(e) if e.is_auth_failure() => {
                info!("Token rejected during refresh; logging out");
                if let Err(storage_err) = self.logout_if_current(generation).await {
                    storage_err.log();
                }
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Refresh failed; keeping cached session");
                Err(e)
            }
        }
    }

    async fn load_stored(&self, generation: u64) -> Option<Credentials> {
        let keys = &self.inner.keys;
        let token = self.inner.store.get(&keys.token).await;
        let user = self.inner.store.get(&keys.user).await;

        let (token, user) = match (token, user) {
            (Ok(token), Ok(user)) => (token, user),
            (Err(e), _) | (_, Err(e)) => {
                warn!(error = %e, "Failed to read persisted session");
                return None;
            }
        };

        match (token, user) {
            (None, None) => {
                debug!("No persisted session");
                None
            }
            (Some(token), Some(user_json)) if !token.is_empty() => {
                match UserRecord::from_json(&user_json) {
                    Ok(user) => Some(Credentials { token, user }),
                    Err(e) => {
                        warn!(error = %e, "Persisted user record is unreadable; discarding session");
                        self.discard_stored(generation).await;
                        None
                    }
                }
            }
            _ => {
                warn!("Persisted session is incomplete; discarding it");
                self.discard_stored(generation).await;
                None
            }
        }
    }

    async fn discard_stored(&self, generation: u64) {
        let _gate = self.inner.write_gate.lock().await;
        if self.inner.generation.load(Ordering::SeqCst) != generation {
            return;
        }
        let keys = &self.inner.keys;
        if let Err(e) = self
            .inner
            .store
            .remove_many(&[keys.token.as_str(), keys.user.as_str()])
            .await
        {
            e.log();
        }
    }

    async fn publish_restored(&self, generation: u64, credentials: Credentials) -> bool {
        let _gate = self.inner.write_gate.lock().await;
        if self.inner.generation.load(Ordering::SeqCst) != generation {
            debug!("Session changed during restore; keeping the newer session");
            return false;
        }
        self.inner
            .state
            .send_modify(|session| session.set_credentials(Some(credentials)));
        true
    }

    async fn revalidate(&self, generation: u64, token: String) {
        match self.inner.identity.current_user(&token).await {
            Ok(user) => {
                if let Err(e) = self.apply_user(generation, user).await {
                    e.log();
                }
            }
            Err(e) if e.is_auth_failure() => {
                info!("Persisted token rejected; logging out");
                if let Err(storage_err) = self.logout_if_current(generation).await {
                    storage_err.log();
                }
            }
            Err(e) => {
                warn!(error = %e, "Revalidation failed; keeping cached session");
            }
        }
    }

    /// Persist and publish a fresh user record. Returns `false` when the
    /// result belongs to an earlier session and was dropped.
    async fn apply_user(&self, generation: u64, user: UserRecord) -> TirumalaResult<bool> {
        let user_json = user.to_json()?;

        let _gate = self.inner.write_gate.lock().await;
        if self.inner.generation.load(Ordering::SeqCst) != generation {
            debug!("Dropping user record from a superseded session");
            return Ok(false);
        }

        self.inner.store.set(&self.inner.keys.user, &user_json).await?;
        self.inner.state.send_if_modified(|session| match session.credentials_mut() {
            Some(credentials) if credentials.user != user => {
                credentials.user = user;
                true
            }
            _ => false,
        });

        debug!("User record reconciled with identity service");
        Ok(true)
    }

    async fn logout_if_current(&self, generation: u64) -> TirumalaResult<bool> {
        let _gate = self.inner.write_gate.lock().await;
        if self.inner.generation.load(Ordering::SeqCst) != generation {
            debug!("Ignoring rejection for a superseded session");
            return Ok(false);
        }
        self.clear_locked().await?;
        Ok(true)
    }

    /// Caller must hold `write_gate`
    async fn clear_locked(&self) -> TirumalaResult<()> {
        let keys = &self.inner.keys;
        let removed = self
            .inner
            .store
            .remove_many(&[keys.token.as_str(), keys.user.as_str()])
            .await;

        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        let was_authenticated = self.inner.state.send_if_modified(|session| {
            if session.credentials().is_some() {
                session.set_credentials(None);
                true
            } else {
                false
            }
        });

        if was_authenticated {
            info!("Logged out");
        }
        removed
    }

    fn finish_loading(&self) {
        self.inner.state.send_if_modified(|session| {
            if session.loading() {
                session.set_loading(false);
                true
            } else {
                false
            }
        });
    }
}

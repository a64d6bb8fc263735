//! Credential Storage - persistence layer for session credentials
//!
//! [`FileCredentialStore`] keeps every key in a single JSON object on disk and
//! rewrites it atomically; [`MemoryCredentialStore`] keeps them in process.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex as StdMutex;
use tirumala_core::{storage_error, CredentialStore, ErrorContext, TirumalaError, TirumalaResult};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// File name of the credential document inside the data directory
pub const CREDENTIALS_FILE: &str = "credentials.json";

/// JSON-file backed credential store
pub struct FileCredentialStore {
    path: PathBuf,
    /// Serialises read-modify-write cycles on the file
    write_lock: Mutex<()>,
}

impl FileCredentialStore {
    /// Create a store that keeps its file inside `data_dir`
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        let path = data_dir.as_ref().join(CREDENTIALS_FILE);
        info!("Credential store at: {}", path.display());
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> TirumalaResult<BTreeMap<String, String>> {
        let data = match tokio::fs::read_to_string(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(storage_error!("Failed to read credential file", "credential_store", e)),
        };

        if data.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        serde_json::from_str(&data).map_err(|e| TirumalaError::Storage {
            message: format!("Credential file {} is corrupt: {}", self.path.display(), e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("credential_store")
                .with_operation("read_all")
                .with_suggestion("Delete the credential file and log in again"),
        })
    }

    async fn write_all(&self, entries: &BTreeMap<String, String>) -> TirumalaResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| storage_error!("Failed to create data directory", "credential_store", e))?;
        }

        let json_data = serde_json::to_string_pretty(entries)?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || persist_private(&path, json_data.as_bytes()))
            .await
            .map_err(|e| TirumalaError::Internal {
                message: format!("Credential write task failed: {}", e),
                source: Some(Box::new(e)),
                context: ErrorContext::new("credential_store").with_operation("write_all"),
            })?
            .map_err(|e| storage_error!("Failed to write credential file", "credential_store", e))?;

        debug!("Saved {} credential entries to {}", entries.len(), self.path.display());
        Ok(())
    }

    async fn update<F>(&self, apply: F) -> TirumalaResult<()>
    where
        F: FnOnce(&mut BTreeMap<String, String>) -> bool + Send,
    {
        let _guard = self.write_lock.lock().await;
        let mut entries = self.read_all().await?;
        if apply(&mut entries) {
            self.write_all(&entries).await?;
        }
        Ok(())
    }
}

/// Write `data` to a fresh owner-only temp file next to `path`, then rename it
/// over `path`. The temp name is unique per call.
fn persist_private(path: &Path, data: &[u8]) -> std::io::Result<()> {
    use std::io::Write;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::Builder::new()
        .prefix(".credentials-")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn get(&self, key: &str) -> TirumalaResult<Option<String>> {
        Ok(self.read_all().await?.remove(key))
    }

    async fn set(&self, key: &str, value: &str) -> TirumalaResult<()> {
        self.set_many(&[(key, value)]).await
    }

    async fn remove(&self, key: &str) -> TirumalaResult<()> {
        self.remove_many(&[key]).await
    }

    async fn set_many(&self, entries: &[(&str, &str)]) -> TirumalaResult<()> {
        self.update(|map| {
            for (key, value) in entries {
                map.insert(key.to_string(), value.to_string());
            }
            true
        })
        .await
    }

    async fn remove_many(&self, keys: &[&str]) -> TirumalaResult<()> {
        self.update(|map| {
            let mut changed = false;
            for key in keys {
                changed |= map.remove(*key).is_some();
            }
            changed
        })
        .await
    }
}

/// In-process credential store
#[derive(Default)]
pub struct MemoryCredentialStore {
    entries: StdMutex<HashMap<String, String>>,
    failing: AtomicBool,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent operation fail with a storage error
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Copy of the current contents
    pub fn snapshot(&self) -> HashMap<String, String> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        // A poisoned map is still structurally valid
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check(&self, operation: &str) -> TirumalaResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            warn!(operation, "Memory credential store is in failing mode");
            return Err(storage_error!(
                format!("Credential store unavailable during {}", operation),
                "memory_credential_store"
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self, key: &str) -> TirumalaResult<Option<String>> {
        self.check("get")?;
        Ok(self.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> TirumalaResult<()> {
        self.check("set")?;
        self.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> TirumalaResult<()> {
        self.check("remove")?;
        self.lock().remove(key);
        Ok(())
    }

    async fn set_many(&self, entries: &[(&str, &str)]) -> TirumalaResult<()> {
        self.check("set_many")?;
        let mut map = self.lock();
        for (key, value) in entries {
            map.insert(key.to_string(), value.to_string());
        }
        Ok(())
    }

    async fn remove_many(&self, keys: &[&str]) -> TirumalaResult<()> {
        self.check("remove_many")?;
        let mut map = self.lock();
        for key in keys {
            map.remove(*key);
        }
        Ok(())
    }
}

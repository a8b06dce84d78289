use crate::core::errors::DConnectError;
use crate::core::types::CredentialRecord;
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Durable key-value storage for credential blobs, keyed by application name.
#[async_trait]
pub trait CredentialStorage: Send + Sync {
    async fn load(&self, app_name: &str) -> Result<Option<String>, DConnectError>;
    async fn save(&self, app_name: &str, blob: &str) -> Result<(), DConnectError>;
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage pre-populated with a blob for `app_name`.
    pub fn with_entry(app_name: impl Into<String>, blob: impl Into<String>) -> Self {
        let storage = Self::default();
        storage.entries.lock().insert(app_name.into(), blob.into());
        storage
    }

    pub fn get(&self, app_name: &str) -> Option<String> {
        self.entries.lock().get(app_name).cloned()
    }
}

#[async_trait]
impl CredentialStorage for MemoryStorage {
    async fn load(&self, app_name: &str) -> Result<Option<String>, DConnectError> {
        Ok(self.get(app_name))
    }

    async fn save(&self, app_name: &str, blob: &str) -> Result<(), DConnectError> {
        self.entries
            .lock()
            .insert(app_name.to_string(), blob.to_string());
        Ok(())
    }
}

/// One JSON file holding `{ "<app name>": "<credential blob>", ... }`.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    async fn read_all(&self) -> Result<BTreeMap<String, String>, DConnectError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) if contents.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(DConnectError::Storage(format!(
                "Failed to read {}: {}",
                self.path.display(),
                e
            ))),
        }
    }
}

#[async_trait]
impl CredentialStorage for FileStorage {
    async fn load(&self, app_name: &str) -> Result<Option<String>, DConnectError> {
        Ok(self.read_all().await?.remove(app_name))
    }

    async fn save(&self, app_name: &str, blob: &str) -> Result<(), DConnectError> {
        let _guard = self.write_lock.lock().await;
        let mut all = self.read_all().await?;
        all.insert(app_name.to_string(), blob.to_string());

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                DConnectError::Storage(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }
        let contents = serde_json::to_string_pretty(&all)?;
        tokio::fs::write(&self.path, contents).await.map_err(|e| {
            DConnectError::Storage(format!("Failed to write {}: {}", self.path.display(), e))
        })
    }
}

/// Credentials of one application, cached in memory and mirrored to storage
///
/// Every change of the access token bumps a generation counter so concurrent
/// callers can tell whether the token they failed with has been replaced.
pub struct TokenStore {
    app_name: String,
    storage: Arc<dyn CredentialStorage>,
    record: RwLock<CredentialRecord>,
    generation: AtomicU64,
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore")
            .field("app_name", &self.app_name)
            .field("has_token", &self.record.read().access_token.is_some())
            .field("generation", &self.generation())
            .finish_non_exhaustive()
    }
}

impl TokenStore {
    /// Load the record for `app_name`; a missing or unreadable blob starts empty.
    pub async fn load(app_name: impl Into<String>, storage: Arc<dyn CredentialStorage>) -> Self {
        let app_name = app_name.into();
        let record = match storage.load(&app_name).await {
            Ok(Some(blob)) => serde_json::from_str(&blob).unwrap_or_else(|e| {
                warn!(app = %app_name, error = %e, "discarding unreadable credentials");
                CredentialRecord::default()
            }),
            Ok(None) => CredentialRecord::default(),
            Err(e) => {
                warn!(app = %app_name, error = %e, "credential storage unavailable");
                CredentialRecord::default()
            }
        };
        debug!(app = %app_name, has_token = record.access_token.is_some(), "credentials loaded");

        Self {
            app_name,
            storage,
            record: RwLock::new(record),
            generation: AtomicU64::new(0),
        }
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn record(&self) -> CredentialRecord {
        self.record.read().clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.record.read().access_token.clone()
    }

    pub fn client_id(&self) -> Option<String> {
        self.record.read().client_id.clone()
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub async fn set_client_id(&self, client_id: Option<String>) -> Result<(), DConnectError> {
        self.record.write().client_id = client_id;
        self.persist().await
    }

    pub async fn set_access_token(
        &self,
        access_token: impl Into<String>,
    ) -> Result<(), DConnectError> {
        self.record.write().access_token = Some(access_token.into());
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.persist().await
    }

    async fn persist(&self) -> Result<(), DConnectError> {
        let blob = serde_json::to_string(&*self.record.read())?;
        self.storage.save(&self.app_name, &blob).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_store_starts_empty_and_persists_updates() {
        let storage = Arc::new(MemoryStorage::new());
        let store = TokenStore::load("app", storage.clone()).await;
        assert_eq!(store.record(), CredentialRecord::default());

        store.set_client_id(Some("client".to_string())).await.unwrap();
        store.set_access_token("token").await.unwrap();

        assert_eq!(store.generation(), 1);
        assert_eq!(
            storage.get("app").as_deref(),
            Some(r#"{"clientId":"client","accessToken":"token"}"#)
        );
    }

    #[tokio::test]
    async fn test_store_loads_existing_blob() {
        let storage = Arc::new(MemoryStorage::with_entry("app", r#"{"accessToken":"saved"}"#));
        let store = TokenStore::load("app", storage).await;
        assert_eq!(store.access_token().as_deref(), Some("saved"));
        assert_eq!(store.client_id(), None);
    }

    #[tokio::test]
    async fn test_corrupt_blob_defaults_to_empty() {
        let storage = Arc::new(MemoryStorage::with_entry("app", "{not json"));
        let store = TokenStore::load("app", storage).await;
        assert_eq!(store.access_token(), None);
    }

    #[tokio::test]
    async fn test_file_storage_roundtrip_keeps_other_apps() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("nested").join("credentials.json");
        let storage = FileStorage::new(&path);

        assert_eq!(storage.load("a").await.unwrap(), None);
        storage.save("a", r#"{"accessToken":"1"}"#).await.unwrap();
        storage.save("b", r#"{"accessToken":"2"}"#).await.unwrap();

        let reopened = FileStorage::new(&path);
        assert_eq!(
            reopened.load("a").await.unwrap().as_deref(),
            Some(r#"{"accessToken":"1"}"#)
        );
        assert_eq!(
            reopened.load("b").await.unwrap().as_deref(),
            Some(r#"{"accessToken":"2"}"#)
        );
    }
}

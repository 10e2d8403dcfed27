//! Key/value persistence for tokens, consent flags and the cached profile.

use std::collections::{BTreeMap, HashMap};
use std::ffi::OsString;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tokio::fs;
use tokio::sync::RwLock;

use crate::error::Error;

/// Consumer-provided secure key/value storage.
///
/// Values are opaque strings. Deleting a missing key is not an error.
///
/// # Example
///
/// ```rust,ignore
/// impl SecureStore for KeychainStore {
///     async fn get(&self, key: &str) -> Result<Option<String>, Error> {
///         self.keychain.read(key).map_err(|e| Error::Storage(e.to_string()))
///     }
///     // ...
/// }
/// ```
pub trait SecureStore: Send + Sync + 'static {
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>, Error>> + Send;

    fn set(&self, key: &str, value: &str) -> impl Future<Output = Result<(), Error>> + Send;

    fn delete(&self, key: &str) -> impl Future<Output = Result<(), Error>> + Send;
}

/// Process-local store, for tests and for hosts without a keychain.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, Error> {
        self.entries
            .lock()
            .map_err(|_| Error::Storage("memory store lock poisoned".into()))
    }
}

impl SecureStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        Ok(self.lock()?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        self.lock()?.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), Error> {
        self.lock()?.remove(key);
        Ok(())
    }
}

/// Single JSON file holding every key, written with owner-only permissions
/// on Unix.
///
/// Writes go to a sibling `.tmp` file that is renamed over the target, so a
/// reader never observes a partially written file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock: RwLock<()>,
}

impl FileStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: RwLock::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<BTreeMap<String, String>, Error> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(Error::Storage(format!("{}: {e}", self.path.display()))),
        };
        match serde_json::from_slice(&bytes) {
            Ok(entries) => Ok(entries),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Discarding unreadable store file");
                Ok(BTreeMap::new())
            }
        }
    }

    async fn write_all(&self, entries: &BTreeMap<String, String>) -> Result<(), Error> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::Storage(format!("{}: {e}", parent.display())))?;
        }
        let bytes = serde_json::to_vec_pretty(entries)
            .map_err(|e| Error::Storage(format!("encode store: {e}")))?;
        let tmp = self.tmp_path();
        fs::write(&tmp, bytes)
            .await
            .map_err(|e| Error::Storage(format!("{}: {e}", tmp.display())))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600))
                .await
                .map_err(|e| Error::Storage(format!("{}: {e}", tmp.display())))?;
        }

        fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| Error::Storage(format!("{}: {e}", self.path.display())))
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(OsString::from).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl SecureStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        let _guard = self.lock.read().await;
        Ok(self.read_all().await?.remove(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        let _guard = self.lock.write().await;
        let mut entries = self.read_all().await?;
        entries.insert(key.to_owned(), value.to_owned());
        self.write_all(&entries).await
    }

    async fn delete(&self, key: &str) -> Result<(), Error> {
        let _guard = self.lock.write().await;
        let mut entries = self.read_all().await?;
        if entries.remove(key).is_some() {
            self.write_all(&entries).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_roundtrip() {
        let store = MemoryStore::new();
        assert_eq!(store.get("k").await.unwrap(), None);
        store.set("k", "v").await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
        store.delete("k").await.unwrap();
        store.delete("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("auth.json");

        let store = FileStore::new(&path);
        store.set("auth_access_token", "A").await.unwrap();
        store.set("auth_refresh_token", "R").await.unwrap();
        store.delete("auth_access_token").await.unwrap();

        let reopened = FileStore::new(&path);
        assert_eq!(reopened.get("auth_access_token").await.unwrap(), None);
        assert_eq!(reopened.get("auth_refresh_token").await.unwrap().as_deref(), Some("R"));
    }

    #[tokio::test]
    async fn corrupt_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auth.json");
        std::fs::write(&path, b"{not json").unwrap();

        let store = FileStore::new(&path);
        assert_eq!(store.get("anything").await.unwrap(), None);
        store.set("k", "v").await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_writes_never_hide_other_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = std::sync::Arc::new(FileStore::new(dir.path().join("auth.json")));
        store.set("auth_refresh_token", "R").await.unwrap();

        let writer = {
            let store = std::sync::Arc::clone(&store);
            tokio::spawn(async move {
                let token = "A".repeat(4096);
                for _ in 0..200 {
                    store.set("auth_access_token", &token).await.unwrap();
                }
            })
        };
        for _ in 0..1000 {
            let refresh = store.get("auth_refresh_token").await.unwrap();
            assert_eq!(refresh.as_deref(), Some("R"));
        }
        writer.await.unwrap();
        assert!(!dir.path().join("auth.json.tmp").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn file_store_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auth.json");
        FileStore::new(&path).set("k", "v").await.unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}

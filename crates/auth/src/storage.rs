//! Scoped key-value persistence capability
//!
//! The session core never touches a storage backend directly. It writes and
//! reads through [`KeyValueStore`], so the hosting shell decides where the
//! token record and the pending-verifier markers live. The only contract the
//! session relies on is that a value written before the redirect to the
//! identity provider is readable after the shell comes back up on the
//! callback route.
//!
//! Two backends ship with the crate: [`MemoryStore`] for tests and ephemeral
//! shells, and [`FileStore`] for desktop shells, which persists a single JSON
//! document across process restarts.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use parking_lot::Mutex;

/// Error type for storage operations
#[derive(Debug)]
pub enum StorageError {
    /// Filesystem operation failed
    Io(std::io::Error),

    /// Stored document could not be encoded or decoded
    Serialization(serde_json::Error),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "storage I/O failed: {e}"),
            Self::Serialization(e) => write!(f, "storage document invalid: {e}"),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err)
    }
}

/// Trait for scoped key-value persistence
///
/// Abstracts the shell's durable storage so tests can substitute an
/// in-memory fake. Implementations must be usable from multiple tasks.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value, `None` if the key is absent
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write a value, overwriting any previous one
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove a key (idempotent)
    async fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// List all keys starting with the given prefix
    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError>;
}

/// In-memory store for tests and ephemeral shells
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the store holds no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.lock().remove(key);
        Ok(())
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        Ok(self
            .entries
            .lock()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

/// File-backed store for desktop shells
///
/// Persists all entries as one JSON object document. The whole document is
/// rewritten on every mutation; entries survive process restarts, which is
/// what carries the pending verifier across the redirect boundary.
///
/// Written with 0600 permissions on unix. Token material is never logged.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Create a store backed by the given document path
    ///
    /// The file is created lazily on first write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing document
    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    fn load(&self) -> Result<HashMap<String, String>, StorageError> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }

        let contents = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    fn save(&self, entries: &HashMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_string_pretty(entries)?;

        #[cfg(unix)]
        {
            use std::io::Write;
            use std::os::unix::fs::OpenOptionsExt;

            let mut file = std::fs::OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o600)
                .open(&self.path)?;
            file.write_all(contents.as_bytes())?;
        }

        #[cfg(not(unix))]
        {
            std::fs::write(&self.path, contents)?;
        }

        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.load()?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.load()?;
        entries.insert(key.to_string(), value.to_string());
        self.save(&entries)
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.load()?;
        entries.remove(key);
        self.save(&entries)
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        Ok(self.load()?.keys().filter(|k| k.starts_with(prefix)).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for storage.
    use super::*;

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();

        store.set("k1", "v1").await.unwrap();
        assert_eq!(store.get("k1").await.unwrap(), Some("v1".to_string()));

        store.set("k1", "v2").await.unwrap();
        assert_eq!(store.get("k1").await.unwrap(), Some("v2".to_string()));

        store.remove("k1").await.unwrap();
        assert_eq!(store.get("k1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_store_remove_is_idempotent() {
        let store = MemoryStore::new();
        store.remove("missing").await.unwrap();
        assert!(store.is_empty());
    }

    /// Prefix listing must only return matching keys.
    #[tokio::test]
    async fn test_memory_store_prefix_listing() {
        let store = MemoryStore::new();

        store.set("auth.verifier.a", "1").await.unwrap();
        store.set("auth.verifier.b", "2").await.unwrap();
        store.set("auth.token", "3").await.unwrap();

        let mut keys = store.keys_with_prefix("auth.verifier.").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["auth.verifier.a", "auth.verifier.b"]);
    }

    /// A second `FileStore` on the same path must observe entries written by
    /// the first; this is the redirect-boundary survival contract.
    #[tokio::test]
    async fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let store = FileStore::new(&path);
        store.set("auth.verifier.s1", "verifier-value").await.unwrap();
        drop(store);

        let reopened = FileStore::new(&path);
        assert_eq!(
            reopened.get("auth.verifier.s1").await.unwrap(),
            Some("verifier-value".to_string())
        );
    }

    #[tokio::test]
    async fn test_file_store_missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("absent.json"));

        assert_eq!(store.get("anything").await.unwrap(), None);
        assert!(store.keys_with_prefix("").await.unwrap().is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_file_store_restricted_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let store = FileStore::new(&path);
        store.set("k", "v").await.unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}

//! Persistence adapters for session state.
//!
//! The store only ever reads and writes one opaque string blob under a fixed
//! name, so the contract is a minimal async get/set/remove. Encryption at
//! rest is the adapter's concern.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{Result, SessionError};

// ============================================================================
// PersistenceAdapter Trait
// ============================================================================

/// Key-value persistence of opaque string blobs.
#[async_trait]
pub trait PersistenceAdapter: Send + Sync + std::fmt::Debug {
    /// Read the blob stored under `name`.
    async fn get(&self, name: &str) -> Result<Option<String>>;

    /// Store `value` under `name`, replacing any previous blob.
    async fn set(&self, name: &str, value: &str) -> Result<()>;

    /// Delete the blob stored under `name`. Missing blobs are not an error.
    async fn remove(&self, name: &str) -> Result<()>;
}

/// Shared persistence adapter for use across async contexts.
pub type SharedStorage = Arc<dyn PersistenceAdapter>;

// ============================================================================
// FileStorage
// ============================================================================

/// File-backed storage: one `<name>.json` file per blob in a directory.
#[derive(Debug)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Store blobs under `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the blobs.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file backing `name`.
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", name))
    }
}

#[async_trait]
impl PersistenceAdapter for FileStorage {
    async fn get(&self, name: &str) -> Result<Option<String>> {
        let path = self.path_for(name);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(SessionError::Persistence(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn set(&self, name: &str, value: &str) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            SessionError::Persistence(format!("Failed to create storage directory: {}", e))
        })?;

        let path = self.path_for(name);
        tokio::fs::write(&path, value).await.map_err(|e| {
            SessionError::Persistence(format!("Failed to write {}: {}", path.display(), e))
        })?;

        tracing::debug!(path = %path.display(), "State persisted");
        Ok(())
    }

    async fn remove(&self, name: &str) -> Result<()> {
        let path = self.path_for(name);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SessionError::Persistence(format!(
                "Failed to delete {}: {}",
                path.display(),
                e
            ))),
        }
    }
}

// ============================================================================
// MemoryStorage (for testing)
// ============================================================================

/// In-memory storage for testing.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    blobs: RwLock<HashMap<String, String>>,
    write_count: AtomicU32,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seed a blob, as if written by an earlier process.
    pub fn with_blob(name: &str, value: impl Into<String>) -> Self {
        let mut blobs = HashMap::new();
        blobs.insert(name.to_string(), value.into());
        Self {
            blobs: RwLock::new(blobs),
            write_count: AtomicU32::new(0),
        }
    }

    /// Number of `set` calls so far.
    pub fn write_count(&self) -> u32 {
        self.write_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PersistenceAdapter for MemoryStorage {
    async fn get(&self, name: &str) -> Result<Option<String>> {
        Ok(self.blobs.read().await.get(name).cloned())
    }

    async fn set(&self, name: &str, value: &str) -> Result<()> {
        self.blobs
            .write()
            .await
            .insert(name.to_string(), value.to_string());
        self.write_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn remove(&self, name: &str) -> Result<()> {
        self.blobs.write().await.remove(name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_file_storage_missing_blob() {
        let temp = tempdir().unwrap();
        let storage = FileStorage::new(temp.path());
        assert_eq!(storage.get("auth-store").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_storage_roundtrip_and_remove() {
        let temp = tempdir().unwrap();
        let storage = FileStorage::new(temp.path().join("nested"));

        storage.set("auth-store", r#"{"a":1}"#).await.unwrap();
        assert!(storage.path_for("auth-store").exists());
        assert_eq!(
            storage.get("auth-store").await.unwrap().as_deref(),
            Some(r#"{"a":1}"#)
        );

        storage.remove("auth-store").await.unwrap();
        assert_eq!(storage.get("auth-store").await.unwrap(), None);

        // Removing twice is fine.
        storage.remove("auth-store").await.unwrap();
    }

    #[tokio::test]
    async fn test_memory_storage_counts_writes() {
        let storage = MemoryStorage::new();
        storage.set("a", "1").await.unwrap();
        storage.set("a", "2").await.unwrap();

        assert_eq!(storage.write_count(), 2);
        assert_eq!(storage.get("a").await.unwrap().as_deref(), Some("2"));

        storage.remove("a").await.unwrap();
        assert_eq!(storage.get("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_storage_seeded() {
        let storage = MemoryStorage::with_blob("auth-store", "{}");
        assert_eq!(storage.get("auth-store").await.unwrap().as_deref(), Some("{}"));
        assert_eq!(storage.write_count(), 0);
    }
}

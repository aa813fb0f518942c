//! Key-value document store abstraction.
//!
//! The registry persists one JSON document per agent id and expects atomic
//! per-key operations. The store has an explicit lifecycle (`open`/`close`)
//! and is injected by construction - never a hidden singleton.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, info};

/// Store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Store closed")]
    Closed,
}

/// Async key-value document store with atomic per-key operations.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Prepare the store for use (create directories, etc.).
    async fn open(&self) -> Result<(), StoreError>;

    /// Release resources. Mutations are flushed eagerly, so this is mostly
    /// a lifecycle marker.
    async fn close(&self) -> Result<(), StoreError>;

    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError>;

    async fn put(&self, key: &str, value: &serde_json::Value) -> Result<(), StoreError>;

    async fn remove(&self, key: &str) -> Result<(), StoreError>;

    async fn keys(&self) -> Result<Vec<String>, StoreError>;
}

/// File-backed store: one pretty-printed JSON document per key.
pub struct FileStore {
    directory: PathBuf,
}

impl FileStore {
    pub fn new(directory: PathBuf) -> Self {
        Self { directory }
    }

    fn document_path(&self, key: &str) -> PathBuf {
        self.directory.join(format!("{key}.json"))
    }
}

#[async_trait]
impl DocumentStore for FileStore {
    async fn open(&self) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.directory).await?;
        info!("Opened file store at {:?}", self.directory);
        Ok(())
    }

    async fn close(&self) -> Result<(), StoreError> {
        debug!("Closed file store at {:?}", self.directory);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError> {
        let path = self.document_path(key);
        if !path.exists() {
            return Ok(None);
        }
        let json = tokio::fs::read_to_string(&path).await?;
        Ok(Some(serde_json::from_str(&json)?))
    }

    async fn put(&self, key: &str, value: &serde_json::Value) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(value)?;
        let path = self.document_path(key);

        // Write-then-rename keeps the per-key update atomic on one filesystem.
        let tmp = self.directory.join(format!(".{key}.json.tmp"));
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!("Persisted document {key} to {:?}", path);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let path = self.document_path(key);
        if path.exists() {
            tokio::fs::remove_file(&path).await?;
            debug!("Removed document {key}");
        }
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, StoreError> {
        if !self.directory.exists() {
            return Ok(Vec::new());
        }

        let mut keys = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.directory).await?;
        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = entry.file_name().to_str() {
                if name.starts_with('.') {
                    continue;
                }
                if let Some(key) = name.strip_suffix(".json") {
                    keys.push(key.to_string());
                }
            }
        }
        Ok(keys)
    }
}

/// In-memory store for tests and ephemeral deployments.
#[derive(Default)]
pub struct MemoryStore {
    documents: RwLock<HashMap<String, serde_json::Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn open(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError> {
        Ok(self.documents.read().get(key).cloned())
    }

    async fn put(&self, key: &str, value: &serde_json::Value) -> Result<(), StoreError> {
        self.documents
            .write()
            .insert(key.to_string(), value.clone());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.documents.write().remove(key);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.documents.read().keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = MemoryStore::new();
        store.open().await.unwrap();

        store
            .put("a1", &serde_json::json!({"name": "one"}))
            .await
            .unwrap();
        let value = store.get("a1").await.unwrap().unwrap();
        assert_eq!(value["name"], "one");

        store.remove("a1").await.unwrap();
        assert!(store.get("a1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().to_path_buf());
        store.open().await.unwrap();

        store
            .put("a1", &serde_json::json!({"name": "one"}))
            .await
            .unwrap();
        let value = store.get("a1").await.unwrap().unwrap();
        assert_eq!(value["name"], "one");

        let keys = store.keys().await.unwrap();
        assert_eq!(keys, vec!["a1".to_string()]);

        store.remove("a1").await.unwrap();
        assert!(store.get("a1").await.unwrap().is_none());
        assert!(store.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_store_get_missing() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().to_path_buf());
        store.open().await.unwrap();
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_store_remove_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().to_path_buf());
        store.open().await.unwrap();
        store.remove("never-existed").await.unwrap();
    }

    #[tokio::test]
    async fn test_file_store_overwrite() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().to_path_buf());
        store.open().await.unwrap();

        store.put("a1", &serde_json::json!({"v": 1})).await.unwrap();
        store.put("a1", &serde_json::json!({"v": 2})).await.unwrap();
        let value = store.get("a1").await.unwrap().unwrap();
        assert_eq!(value["v"], 2);
        assert_eq!(store.keys().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_file_store_survives_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = FileStore::new(dir.path().to_path_buf());
            store.open().await.unwrap();
            store.put("a1", &serde_json::json!({"v": 1})).await.unwrap();
            store.close().await.unwrap();
        }

        let store = FileStore::new(dir.path().to_path_buf());
        store.open().await.unwrap();
        let value = store.get("a1").await.unwrap().unwrap();
        assert_eq!(value["v"], 1);
    }
}

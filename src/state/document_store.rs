use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::PathBuf;
use tokio::sync::Mutex;

use crate::error::{BotError, Result};

/// Key -> document storage, grouped into named collections
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch one document by key, `None` if it does not exist
    async fn find_one(&self, collection: &str, key: &str) -> Result<Option<Value>>;

    /// Insert or replace the document stored under `key`
    async fn upsert(&self, collection: &str, key: &str, document: Value) -> Result<()>;
}

/// Document store that keeps each collection as one JSON object on disk
///
/// Layout: `{root}/{collection}.json` containing `{ "<key>": <document>, ... }`.
pub struct JsonDocumentStore {
    root: PathBuf,
    /// Serializes read-modify-write cycles
    write_lock: Mutex<()>,
}

impl JsonDocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    fn collection_path(&self, collection: &str) -> PathBuf {
        self.root.join(format!("{}.json", collection))
    }

    async fn load_collection(&self, collection: &str) -> Result<Map<String, Value>> {
        let path = self.collection_path(collection);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => serde_json::from_str(&content).map_err(|e| BotError::StoreRead {
                collection: collection.to_string(),
                message: format!("{} is not a valid collection: {}", path.display(), e),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Map::new()),
            Err(e) => Err(BotError::StoreRead {
                collection: collection.to_string(),
                message: e.to_string(),
            }),
        }
    }

    /// Save to file atomically
    async fn save_collection(&self, collection: &str, documents: &Map<String, Value>) -> Result<()> {
        let write_err = |e: std::io::Error| BotError::StoreWrite {
            collection: collection.to_string(),
            message: e.to_string(),
        };

        tokio::fs::create_dir_all(&self.root).await.map_err(write_err)?;

        let path = self.collection_path(collection);
        let temp_path = path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(documents)?;

        tokio::fs::write(&temp_path, &content).await.map_err(write_err)?;
        tokio::fs::rename(&temp_path, &path).await.map_err(write_err)?;

        Ok(())
    }
}

#[async_trait]
impl DocumentStore for JsonDocumentStore {
    async fn find_one(&self, collection: &str, key: &str) -> Result<Option<Value>> {
        let documents = self.load_collection(collection).await?;
        Ok(documents.get(key).cloned())
    }

    async fn upsert(&self, collection: &str, key: &str, document: Value) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut documents = self.load_collection(collection).await?;
        documents.insert(key.to_string(), document);
        self.save_collection(collection, &documents).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_missing_collection_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDocumentStore::new(dir.path());

        assert!(store.find_one("servers", "1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_replaces_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDocumentStore::new(dir.path().join("nested"));

        store.upsert("servers", "1", json!({"a": 1})).await.unwrap();
        store.upsert("servers", "2", json!({"a": 2})).await.unwrap();
        store.upsert("servers", "1", json!({"a": 3})).await.unwrap();

        // A fresh store over the same directory sees the written state
        let reopened = JsonDocumentStore::new(dir.path().join("nested"));
        assert_eq!(
            reopened.find_one("servers", "1").await.unwrap(),
            Some(json!({"a": 3}))
        );
        assert_eq!(
            reopened.find_one("servers", "2").await.unwrap(),
            Some(json!({"a": 2}))
        );
        assert!(!dir.path().join("nested/servers.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_corrupt_collection_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("servers.json"), "not json").unwrap();
        let store = JsonDocumentStore::new(dir.path());

        let result = store.find_one("servers", "1").await;
        assert!(matches!(
            result,
            Err(BotError::StoreRead { ref collection, .. }) if collection == "servers"
        ));
    }
}

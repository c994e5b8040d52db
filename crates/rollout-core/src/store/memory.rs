use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

use super::{BlobInfo, BlobStore, StorageError, StorageResult};

/// Process-local blob store, used by tests and dry runs
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, (Vec<u8>, DateTime<Utc>)>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a blob with an explicit modification time
    pub fn insert_raw(&self, key: &str, body: Vec<u8>, updated: DateTime<Utc>) {
        self.lock().insert(key.to_string(), (body, updated));
    }

    /// Current contents of `key`, if any
    pub fn contents(&self, key: &str) -> Option<Vec<u8>> {
        self.lock().get(key).map(|(body, _)| body.clone())
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, (Vec<u8>, DateTime<Utc>)>> {
        // A poisoned map is still consistent: every update is a single insert/remove
        self.blobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, key: &str, body: Vec<u8>) -> StorageResult<()> {
        self.insert_raw(key, body, Utc::now());
        Ok(())
    }

    async fn get(&self, key: &str) -> StorageResult<Vec<u8>> {
        self.contents(key).ok_or_else(|| StorageError::NotFound {
            key: key.to_string(),
        })
    }

    async fn list(&self) -> StorageResult<Vec<BlobInfo>> {
        Ok(self
            .lock()
            .iter()
            .map(|(key, (_, updated))| BlobInfo {
                key: key.clone(),
                updated: *updated,
            })
            .collect())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        match self.lock().remove(key) {
            Some(_) => Ok(()),
            None => Err(StorageError::NotFound {
                key: key.to_string(),
            }),
        }
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}

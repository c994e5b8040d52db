use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

use super::{BlobInfo, BlobStore, StorageError, StorageResult};

/// Blob store backed by a directory, one file per key
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> StorageResult<PathBuf> {
        if key.is_empty() || key.contains(['/', '\\']) || key == "." || key == ".." {
            return Err(StorageError::Backend(format!("invalid blob key '{}'", key)));
        }
        Ok(self.root.join(key))
    }
}

fn not_found_or(key: &str, err: std::io::Error) -> StorageError {
    if err.kind() == ErrorKind::NotFound {
        StorageError::NotFound {
            key: key.to_string(),
        }
    } else {
        StorageError::Io(err)
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, key: &str, body: Vec<u8>) -> StorageResult<()> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.root).await?;

        // Write next to the target and rename so readers never see half a document
        let tmp = self.root.join(format!(".{}.tmp", key));
        fs::write(&tmp, body).await?;
        fs::rename(&tmp, &path).await?;
        debug!("Wrote {}", path.display());
        Ok(())
    }

    async fn get(&self, key: &str) -> StorageResult<Vec<u8>> {
        let path = self.path_for(key)?;
        fs::read(&path).await.map_err(|e| not_found_or(key, e))
    }

    async fn list(&self) -> StorageResult<Vec<BlobInfo>> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut blobs = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            let Some(key) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if key.starts_with('.') {
                continue;
            }
            let updated: DateTime<Utc> = metadata.modified()?.into();
            blobs.push(BlobInfo { key, updated });
        }
        Ok(blobs)
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let path = self.path_for(key)?;
        fs::remove_file(&path).await.map_err(|e| not_found_or(key, e))
    }

    fn location(&self) -> String {
        self.root.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_put_get_delete() {
        let dir = TempDir::new().unwrap();
        let store = FsBlobStore::new(dir.path().join("states"));

        store.put("run.json", b"{}".to_vec()).await.unwrap();
        assert_eq!(store.get("run.json").await.unwrap(), b"{}");

        store.put("run.json", b"[]".to_vec()).await.unwrap();
        assert_eq!(store.get("run.json").await.unwrap(), b"[]");

        store.delete("run.json").await.unwrap();
        assert!(matches!(
            store.get("run.json").await.unwrap_err(),
            StorageError::NotFound { .. }
        ));
        assert!(matches!(
            store.delete("run.json").await.unwrap_err(),
            StorageError::NotFound { .. }
        ));
    }

    #[tokio::test]
    async fn test_list_missing_dir_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = FsBlobStore::new(dir.path().join("nothing-here"));
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_skips_dirs_and_hidden_files() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join(".a.json.tmp"), b"x").unwrap();
        std::fs::write(dir.path().join("a.json"), b"{}").unwrap();

        let store = FsBlobStore::new(dir.path());
        let keys: Vec<String> = store.list().await.unwrap().into_iter().map(|b| b.key).collect();
        assert_eq!(keys, vec!["a.json"]);
    }

    #[tokio::test]
    async fn test_rejects_path_traversal() {
        let dir = TempDir::new().unwrap();
        let store = FsBlobStore::new(dir.path());
        assert!(store.put("../escape.json", Vec::new()).await.is_err());
        assert!(store.get("a/b.json").await.is_err());
    }
}

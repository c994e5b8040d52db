//! Durable storage of run state
//!
//! `StateStore` maps a run name to one JSON blob (`<name>.json`) in a
//! `BlobStore`. Writes are last-writer-wins; a single operator is expected
//! to drive a run at a time.

mod gcs;
mod local;
mod memory;

pub use gcs::GcsBlobStore;
pub use local::FsBlobStore;
pub use memory::MemoryBlobStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info};
use std::sync::Arc;
use thiserror::Error;

use crate::console::Console;
use crate::error::{Result, RolloutError};
use crate::model::BatchState;

const STATE_SUFFIX: &str = ".json";
const CANCEL: &str = "Cancel";

pub type StorageResult<T> = std::result::Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("blob '{key}' does not exist")]
    NotFound { key: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Metadata of a stored blob
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobInfo {
    pub key: String,
    pub updated: DateTime<Utc>,
}

/// Flat key/value object storage
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Create or overwrite `key`
    async fn put(&self, key: &str, body: Vec<u8>) -> StorageResult<()>;

    async fn get(&self, key: &str) -> StorageResult<Vec<u8>>;

    async fn list(&self) -> StorageResult<Vec<BlobInfo>>;

    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Where the blobs live, for operator messages (e.g. `gs://bucket`)
    fn location(&self) -> String;
}

/// A stored run as offered to the operator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunEntry {
    pub name: String,
    pub updated: DateTime<Utc>,
}

impl RunEntry {
    /// "name, 2024-05-01 12:00:00 UTC"
    pub fn label(&self) -> String {
        format!("{}, {}", self.name, self.updated.format("%Y-%m-%d %H:%M:%S UTC"))
    }
}

/// Blob key for a run name; accepts names that already carry the suffix
pub fn state_key(name: &str) -> String {
    if name.ends_with(STATE_SUFFIX) {
        name.to_string()
    } else {
        format!("{}{}", name, STATE_SUFFIX)
    }
}

/// Run name for a blob key
pub fn run_name(key: &str) -> &str {
    key.strip_suffix(STATE_SUFFIX).unwrap_or(key)
}

/// Named persistence of `BatchState`
#[derive(Clone)]
pub struct StateStore {
    blobs: Arc<dyn BlobStore>,
    operator: Option<String>,
}

impl StateStore {
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            blobs,
            operator: None,
        }
    }

    /// Identity token used to filter runs in `list(false)`
    pub fn with_operator(mut self, operator: impl Into<String>) -> Self {
        self.operator = Some(operator.into());
        self
    }

    pub fn operator(&self) -> Option<&str> {
        self.operator.as_deref()
    }

    pub fn location(&self) -> String {
        self.blobs.location()
    }

    /// Serialize and upload, overwriting any previous version
    pub async fn save(&self, state: &BatchState) -> Result<()> {
        let key = state_key(&state.name);
        let body = serde_json::to_vec(state)?;
        self.blobs.put(&key, body).await?;
        debug!("Saved state {} ({} repos)", key, state.len());
        Ok(())
    }

    pub async fn load(&self, name: &str) -> Result<BatchState> {
        let key = state_key(name);
        let body = match self.blobs.get(&key).await {
            Ok(body) => body,
            Err(StorageError::NotFound { .. }) => {
                return Err(RolloutError::NotFound(format!("state file '{}'", key)));
            }
            Err(e) => return Err(e.into()),
        };

        let state: BatchState = serde_json::from_slice(&body)?;
        state.validate().map_err(RolloutError::Configuration)?;
        info!("Loaded state {} ({} repos)", key, state.len());
        Ok(state)
    }

    /// Runs, most recently modified first
    ///
    /// Without `include_other_users` only runs whose name contains the
    /// operator identity are returned. This is a naming convention, not
    /// access control.
    pub async fn list(&self, include_other_users: bool) -> Result<Vec<RunEntry>> {
        let mut blobs = self.blobs.list().await?;
        blobs.sort_by(|a, b| b.updated.cmp(&a.updated));

        let runs = blobs
            .into_iter()
            .filter(|blob| blob.key.ends_with(STATE_SUFFIX))
            .map(|blob| RunEntry {
                name: run_name(&blob.key).to_string(),
                updated: blob.updated,
            });

        let runs = match (&self.operator, include_other_users) {
            (Some(operator), false) => runs.filter(|run| run.name.contains(operator.as_str())).collect(),
            (None, false) => {
                debug!("No operator identity known, listing runs of all users");
                runs.collect()
            }
            (_, true) => runs.collect(),
        };
        Ok(runs)
    }

    /// Delete a run. Irreversible.
    pub async fn remove(&self, name: &str) -> Result<()> {
        let key = state_key(name);
        match self.blobs.delete(&key).await {
            Ok(()) => Ok(()),
            Err(StorageError::NotFound { .. }) => {
                Err(RolloutError::NotFound(format!("state file '{}'", key)))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Let the operator pick a run
    ///
    /// A single candidate is chosen without asking. No candidates at all is
    /// a configuration error. Returns `None` when the operator cancels.
    pub async fn select_run(
        &self,
        include_other_users: bool,
        console: &dyn Console,
    ) -> Result<Option<String>> {
        let runs = self.list(include_other_users).await?;

        let chosen = match runs.as_slice() {
            [] => {
                return Err(RolloutError::configuration(
                    "No state files were found. Create a new one with 'gh-pr-rollout ready'",
                ));
            }
            [only] => Some(only.name.clone()),
            _ => {
                let mut choices: Vec<String> = runs.iter().map(RunEntry::label).collect();
                choices.push(CANCEL.to_string());
                match console.select("Which run do you want to perform this action on?", &choices)? {
                    Some(index) if index < runs.len() => Some(runs[index].name.clone()),
                    _ => None,
                }
            }
        };

        if let Some(name) = &chosen {
            console.info(&format!("Using state file with name {}", name));
        }
        Ok(chosen)
    }

    /// Select a run interactively and load it
    pub async fn load_selected(
        &self,
        include_other_users: bool,
        console: &dyn Console,
    ) -> Result<Option<BatchState>> {
        match self.select_run(include_other_users, console).await? {
            Some(name) => Ok(Some(self.load(&name).await?)),
            None => Ok(None),
        }
    }
}

//! Participant record storage.
//!
//! Every backend offers the same two capabilities the service needs:
//! - Upsert of a user record keyed by uuid
//! - Group-by aggregation of steps per prefecture
//!
//! Backends:
//! - `MemoryStore`: process-local map, used by tests and ephemeral servers
//! - `JsonlStore`: append-only JSON Lines log replayed on open

mod jsonl;
mod memory;

pub use jsonl::*;
pub use memory::*;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{PrefectureStat, StepReport, UserRecord};

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Store lock poisoned")]
    Poisoned,

    #[error("Store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Persistent store of participant records.
#[async_trait]
pub trait StepStore: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &'static str;

    /// Insert the record for `report.uuid`, or replace its prefecture and steps.
    async fn upsert_user(&self, report: &StepReport) -> Result<UserRecord, StorageError>;

    /// Per-prefecture aggregate over every stored record. Prefectures without
    /// members are omitted.
    async fn group_by_prefecture(&self) -> Result<Vec<PrefectureStat>, StorageError>;

    /// Most recently updated records, newest first.
    async fn recent_users(&self, limit: usize) -> Result<Vec<UserRecord>, StorageError>;
}

/// Which store backend to run with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    Memory,
    #[default]
    Jsonl,
}

/// Configuration for storage paths.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl StorageConfig {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    pub fn state_dir(&self) -> PathBuf {
        self.data_dir.join("state")
    }

    /// Log of user records.
    pub fn users_path(&self) -> PathBuf {
        self.state_dir().join("users.jsonl")
    }

    /// Open the configured backend as the owner of its files. A JSONL log is
    /// compacted on open.
    pub fn open(&self, backend: StoreBackend) -> Result<Arc<dyn StepStore>, StorageError> {
        let store: Arc<dyn StepStore> = match backend {
            StoreBackend::Memory => Arc::new(MemoryStore::new()),
            StoreBackend::Jsonl => Arc::new(JsonlStore::open_and_compact(self.users_path())?),
        };
        tracing::info!("Opened {} store", store.name());
        Ok(store)
    }

    /// Open the backend for reading alongside the process that owns it.
    /// Files are never rewritten.
    pub fn open_snapshot(&self, backend: StoreBackend) -> Result<Arc<dyn StepStore>, StorageError> {
        let store: Arc<dyn StepStore> = match backend {
            StoreBackend::Memory => Arc::new(MemoryStore::new()),
            StoreBackend::Jsonl => Arc::new(JsonlStore::open(self.users_path())?),
        };
        tracing::debug!("Opened {} snapshot", store.name());
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_config_paths() {
        let config = StorageConfig::new(PathBuf::from("/data"));

        assert_eq!(config.state_dir(), PathBuf::from("/data/state"));
        assert_eq!(config.users_path(), PathBuf::from("/data/state/users.jsonl"));
    }

    #[test]
    fn test_store_backend_serde() {
        let parsed: StoreBackend = serde_json::from_str("\"memory\"").unwrap();
        assert_eq!(parsed, StoreBackend::Memory);
        assert_eq!(StoreBackend::default(), StoreBackend::Jsonl);
    }

    #[tokio::test]
    async fn test_open_jsonl_backend() {
        let tmp = tempfile::tempdir().unwrap();
        let config = StorageConfig::new(tmp.path().to_path_buf());

        let store = config.open(StoreBackend::Jsonl).unwrap();
        assert_eq!(store.name(), "jsonl");
        store
            .upsert_user(&StepReport::new("a", 1, 10).unwrap())
            .await
            .unwrap();
        assert!(config.users_path().exists());
    }

    #[tokio::test]
    async fn test_snapshot_does_not_compact() {
        let tmp = tempfile::tempdir().unwrap();
        let config = StorageConfig::new(tmp.path().to_path_buf());

        let owner = config.open(StoreBackend::Jsonl).unwrap();
        owner.upsert_user(&StepReport::new("a", 1, 10).unwrap()).await.unwrap();
        owner.upsert_user(&StepReport::new("a", 1, 20).unwrap()).await.unwrap();

        let snapshot = config.open_snapshot(StoreBackend::Jsonl).unwrap();
        let groups = snapshot.group_by_prefecture().await.unwrap();
        assert_eq!(groups[0].average_steps, 20);

        let raw = std::fs::read_to_string(config.users_path()).unwrap();
        assert_eq!(raw.lines().count(), 2);
    }
}

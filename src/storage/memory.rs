//! In-memory record store.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use super::{StepStore, StorageError};
use crate::calculate::aggregate_records;
use crate::models::{PrefectureStat, StepReport, UserRecord};

/// Records keyed by uuid. Each upsert holds the write lock only for the
/// single map update, so reports from different users never wait on I/O.
#[derive(Debug, Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<String, UserRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.users.read().map(|u| u.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Apply a report to a uuid-keyed map with insert-or-replace semantics.
fn upsert_in(users: &mut HashMap<String, UserRecord>, report: &StepReport) -> UserRecord {
    let now = Utc::now();
    let record = users
        .entry(report.uuid.clone())
        .and_modify(|r| r.apply(report, now))
        .or_insert_with(|| UserRecord::from_report(report, now));
    record.clone()
}

/// Newest-first slice of a record map.
pub(crate) fn newest_first(users: &HashMap<String, UserRecord>, limit: usize) -> Vec<UserRecord> {
    let mut records: Vec<UserRecord> = users.values().cloned().collect();
    records.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.uuid.cmp(&b.uuid)));
    records.truncate(limit);
    records
}

#[async_trait]
impl StepStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn upsert_user(&self, report: &StepReport) -> Result<UserRecord, StorageError> {
        let mut users = self.users.write().map_err(|_| StorageError::Poisoned)?;
        Ok(upsert_in(&mut users, report))
    }

    async fn group_by_prefecture(&self) -> Result<Vec<PrefectureStat>, StorageError> {
        let users = self.users.read().map_err(|_| StorageError::Poisoned)?;
        Ok(aggregate_records(users.values()))
    }

    async fn recent_users(&self, limit: usize) -> Result<Vec<UserRecord>, StorageError> {
        let users = self.users.read().map_err(|_| StorageError::Poisoned)?;
        Ok(newest_first(&users, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn report(uuid: &str, prefecture: i64, steps: i64) -> StepReport {
        StepReport::new(uuid, prefecture, steps).unwrap()
    }

    #[tokio::test]
    async fn test_upsert_inserts_then_replaces() {
        let store = MemoryStore::new();

        let first = store.upsert_user(&report("a", 5, 100)).await.unwrap();
        let second = store.upsert_user(&report("a", 9, 50)).await.unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(second.prefecture_id.get(), 9);
        assert_eq!(second.steps, 50);
        assert_eq!(second.created_at, first.created_at);

        let groups = store.group_by_prefecture().await.unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].prefecture_id.get(), 9);
        assert_eq!(groups[0].average_steps, 50);
    }

    #[tokio::test]
    async fn test_repeated_report_is_idempotent() {
        let store = MemoryStore::new();
        store.upsert_user(&report("a", 3, 700)).await.unwrap();
        let once = store.group_by_prefecture().await.unwrap();

        store.upsert_user(&report("a", 3, 700)).await.unwrap();
        let twice = store.group_by_prefecture().await.unwrap();

        assert_eq!(once, twice);
    }

    #[tokio::test]
    async fn test_concurrent_upserts_from_different_users() {
        let store = Arc::new(MemoryStore::new());
        let mut handles = Vec::new();
        for i in 0..50 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let uuid = format!("user-{}", i);
                store.upsert_user(&report(&uuid, 1 + i % 47, 100)).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.len(), 50);
        let groups = store.group_by_prefecture().await.unwrap();
        let members: u64 = groups.iter().map(|g| g.user_count).sum();
        assert_eq!(members, 50);
    }

    #[test]
    fn test_recent_users_newest_first() {
        let store = MemoryStore::new();
        tokio_test::block_on(async {
            store.upsert_user(&report("old", 1, 1)).await.unwrap();
            std::thread::sleep(std::time::Duration::from_millis(5));
            store.upsert_user(&report("new", 2, 2)).await.unwrap();

            let recent = store.recent_users(10).await.unwrap();
            assert_eq!(recent[0].uuid, "new");
            assert_eq!(recent[1].uuid, "old");

            let limited = store.recent_users(1).await.unwrap();
            assert_eq!(limited.len(), 1);
        });
    }
}

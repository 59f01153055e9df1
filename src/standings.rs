//! Standings service.
//!
//! Binds the pure aggregation and ranking engine to a record store. Each
//! read recomputes from a fresh store snapshot; nothing is cached.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::calculate::{classify, fill_missing, TierPolicy};
use crate::models::{PrefectureId, PrefectureStat, RankedPrefecture, StepReport, UserRecord, ValidationError};
use crate::storage::{StepStore, StorageError};

/// Errors surfaced by the standings service.
#[derive(Debug, Error)]
pub enum StandingsError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Store error: {0}")]
    Store(#[from] StorageError),
}

#[derive(Clone)]
pub struct Standings {
    store: Arc<dyn StepStore>,
    policy: TierPolicy,
}

impl Standings {
    pub fn new(store: Arc<dyn StepStore>, policy: TierPolicy) -> Self {
        Self { store, policy }
    }

    pub fn store(&self) -> &Arc<dyn StepStore> {
        &self.store
    }

    /// Validate and record a report.
    pub async fn report_steps(
        &self,
        uuid: &str,
        prefecture_id: i64,
        steps: i64,
    ) -> Result<UserRecord, StandingsError> {
        let report = StepReport::new(uuid, prefecture_id, steps)?;
        Ok(self.submit(&report).await?)
    }

    /// Record an already validated report.
    pub async fn submit(&self, report: &StepReport) -> Result<UserRecord, StorageError> {
        let record = self.store.upsert_user(report).await?;
        info!(
            uuid = %record.uuid,
            prefecture = %record.prefecture_id,
            steps = record.steps,
            "Recorded steps"
        );
        Ok(record)
    }

    /// One aggregate per prefecture, ascending by id.
    pub async fn compute_stats(&self) -> Result<Vec<PrefectureStat>, StorageError> {
        let groups = self.store.group_by_prefecture().await?;
        debug!("{} prefectures have participants", groups.len());
        Ok(fill_missing(&groups))
    }

    /// Classified snapshot of all prefectures, ascending by id.
    pub async fn list(&self) -> Result<Vec<RankedPrefecture>, StorageError> {
        let stats = self.compute_stats().await?;
        Ok(classify(&stats, self.policy))
    }

    /// Single prefecture, classified against the full snapshot.
    pub async fn get(&self, prefecture_id: PrefectureId) -> Result<RankedPrefecture, StorageError> {
        let all = self.list().await?;
        Ok(all[prefecture_id.index()])
    }
}

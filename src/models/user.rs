//! Per-user step record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{PrefectureId, StepReport};

/// The current state of one participant. At most one record exists per uuid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    /// Opaque client identity (unique key)
    pub uuid: String,

    /// Prefecture the steps count towards
    pub prefecture_id: PrefectureId,

    /// Most recently reported step count
    pub steps: u64,

    /// When the record was first created
    pub created_at: DateTime<Utc>,

    /// When the record was last written
    pub updated_at: DateTime<Utc>,
}

impl UserRecord {
    /// Create a fresh record from a report.
    pub fn from_report(report: &StepReport, now: DateTime<Utc>) -> Self {
        Self {
            uuid: report.uuid.clone(),
            prefecture_id: report.prefecture_id,
            steps: report.steps,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replace prefecture and steps with a newer report. Not additive.
    pub fn apply(&mut self, report: &StepReport, now: DateTime<Utc>) {
        self.prefecture_id = report.prefecture_id;
        self.steps = report.steps;
        self.updated_at = now;
    }
}

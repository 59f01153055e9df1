//! Derived per-prefecture statistics models.

use serde::{Deserialize, Serialize};

use super::PrefectureId;

/// Status tier of a prefecture. Serialized as its integer code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Status {
    Bottom = 0,
    Middle = 1,
    Top = 2,
}

impl Status {
    pub fn code(&self) -> u8 {
        *self as u8
    }
}

impl From<Status> for u8 {
    fn from(status: Status) -> Self {
        status.code()
    }
}

impl TryFrom<u8> for Status {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Status::Bottom),
            1 => Ok(Status::Middle),
            2 => Ok(Status::Top),
            other => Err(format!("unknown status code: {}", other)),
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Bottom => write!(f, "bottom"),
            Status::Middle => write!(f, "middle"),
            Status::Top => write!(f, "top"),
        }
    }
}

/// Aggregate steps of one prefecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrefectureStat {
    pub prefecture_id: PrefectureId,

    /// Integer mean of member steps, 0 without members
    pub average_steps: u64,

    /// Number of contributing users
    pub user_count: u64,
}

impl PrefectureStat {
    /// Placeholder for a prefecture with no participants.
    pub fn empty(prefecture_id: PrefectureId) -> Self {
        Self {
            prefecture_id,
            average_steps: 0,
            user_count: 0,
        }
    }

    /// Whether the prefecture takes part in the ranking.
    pub fn is_active(&self) -> bool {
        self.average_steps > 0
    }
}

/// Classification result for one prefecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedPrefecture {
    pub prefecture_id: PrefectureId,
    pub average_steps: u64,
    pub status: Status,

    /// Zero-based position among active prefectures; `None` when inactive
    #[serde(skip)]
    pub rank: Option<usize>,
}

/// Counts of prefectures per status tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCount {
    pub high: u32,
    pub mid: u32,
    pub low: u32,
}

impl StatusCount {
    pub fn tally<'a>(entries: impl IntoIterator<Item = &'a RankedPrefecture>) -> Self {
        let mut counts = Self::default();
        for entry in entries {
            match entry.status {
                Status::Top => counts.high += 1,
                Status::Middle => counts.mid += 1,
                Status::Bottom => counts.low += 1,
            }
        }
        counts
    }
}

//! Response decorators.
//!
//! Classification results stay minimal; presentation data such as image
//! URLs and prefecture names is attached here, after ranking.

use serde::Serialize;
use url::Url;

use crate::models::{PrefectureId, RankedPrefecture, Status, StatusCount};

/// Resolves character image URLs from prefecture and status.
#[derive(Debug, Clone)]
pub struct ImageResolver {
    base: Url,
}

impl ImageResolver {
    pub fn new(base: Url) -> Self {
        Self { base }
    }

    /// `{base}/{id:02}-{status}.jpeg`
    pub fn image_url(&self, prefecture_id: PrefectureId, status: Status) -> String {
        format!(
            "{}/{:02}-{}.jpeg",
            self.base.as_str().trim_end_matches('/'),
            prefecture_id.get(),
            status.code()
        )
    }
}

/// One prefecture as returned by the character endpoints.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterView {
    pub prefecture_id: PrefectureId,
    pub average_steps: u64,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl CharacterView {
    pub fn new(entry: &RankedPrefecture, images: Option<&ImageResolver>) -> Self {
        Self {
            prefecture_id: entry.prefecture_id,
            average_steps: entry.average_steps,
            status: entry.status,
            image_url: images.map(|r| r.image_url(entry.prefecture_id, entry.status)),
        }
    }
}

/// A leaderboard row.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    /// 1-based position among active prefectures
    pub rank: Option<usize>,
    pub name: &'static str,
    #[serde(flatten)]
    pub character: CharacterView,
}

impl LeaderboardEntry {
    pub fn new(entry: &RankedPrefecture, images: Option<&ImageResolver>) -> Self {
        Self {
            rank: entry.rank.map(|r| r + 1),
            name: entry.prefecture_id.name(),
            character: CharacterView::new(entry, images),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardResponse {
    pub entries: Vec<LeaderboardEntry>,
    pub national_average: u64,
    pub status_count: StatusCount,
}

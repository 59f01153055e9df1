//! Aggregation and ranking engine.
//!
//! Turns user records into per-prefecture averages and classifies them into
//! status tiers:
//! - Group-by aggregation with integer averages
//! - Gap filling so every prefecture is represented
//! - Ranking of active prefectures with a deterministic tie-break
//! - Tier assignment from the top-30% cut

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::{PrefectureId, PrefectureStat, RankedPrefecture, Status, UserRecord, PREFECTURE_COUNT};

/// Rule for active prefectures that fall outside the top cut.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierPolicy {
    /// Every active prefecture below the top cut is middle tier.
    #[default]
    Compatible,
    /// Active prefectures in the bottom 30% drop to the bottom tier.
    ThreeWay,
}

/// Integer mean rounded half up. Zero when there is nothing to average.
pub fn rounded_mean(sum: u64, count: u64) -> u64 {
    if count == 0 {
        return 0;
    }
    ((sum as u128 + count as u128 / 2) / count as u128) as u64
}

/// Group records by prefecture. Only prefectures with members are returned,
/// ordered by id.
pub fn aggregate_records<'a>(records: impl IntoIterator<Item = &'a UserRecord>) -> Vec<PrefectureStat> {
    let mut groups: BTreeMap<PrefectureId, (u64, u64)> = BTreeMap::new();
    for record in records {
        let entry = groups.entry(record.prefecture_id).or_default();
        entry.0 = entry.0.saturating_add(record.steps);
        entry.1 += 1;
    }

    groups
        .into_iter()
        .map(|(prefecture_id, (sum, count))| PrefectureStat {
            prefecture_id,
            average_steps: rounded_mean(sum, count),
            user_count: count,
        })
        .collect()
}

/// Expand a sparse aggregate into exactly one entry per prefecture, ascending.
pub fn fill_missing(groups: &[PrefectureStat]) -> Vec<PrefectureStat> {
    let mut all: Vec<PrefectureStat> = PrefectureId::all().map(PrefectureStat::empty).collect();
    for group in groups {
        all[group.prefecture_id.index()] = *group;
    }
    all
}

/// Size of the top tier for `active` ranked prefectures: `ceil(active * 0.3)`.
pub fn top_cut(active: usize) -> usize {
    (active * 3).div_ceil(10)
}

/// Active prefectures sorted by average descending, ties by ascending id.
pub fn rank_active(stats: &[PrefectureStat]) -> Vec<PrefectureStat> {
    let mut active: Vec<PrefectureStat> = stats.iter().filter(|s| s.is_active()).copied().collect();
    active.sort_by(|a, b| {
        b.average_steps
            .cmp(&a.average_steps)
            .then_with(|| a.prefecture_id.cmp(&b.prefecture_id))
    });
    active
}

/// Tier of the entry at `index` among `active` ranked prefectures.
pub fn assign_status(index: usize, active: usize, policy: TierPolicy) -> Status {
    let cut = top_cut(active);
    if index < cut {
        return Status::Top;
    }
    match policy {
        TierPolicy::Compatible => Status::Middle,
        TierPolicy::ThreeWay if index >= active - cut => Status::Bottom,
        TierPolicy::ThreeWay => Status::Middle,
    }
}

/// Classify all prefectures. The result always has one entry per prefecture
/// in ascending id order; inactive prefectures are bottom tier and unranked.
pub fn classify(stats: &[PrefectureStat], policy: TierPolicy) -> Vec<RankedPrefecture> {
    let all = fill_missing(stats);
    let ranked = rank_active(&all);
    let active = ranked.len();

    let mut result: Vec<RankedPrefecture> = all
        .iter()
        .map(|s| RankedPrefecture {
            prefecture_id: s.prefecture_id,
            average_steps: s.average_steps,
            status: Status::Bottom,
            rank: None,
        })
        .collect();

    for (index, stat) in ranked.iter().enumerate() {
        let entry = &mut result[stat.prefecture_id.index()];
        entry.rank = Some(index);
        entry.status = assign_status(index, active, policy);
    }

    debug_assert_eq!(result.len(), PREFECTURE_COUNT as usize);
    result
}

/// Reorder classified entries into leaderboard order.
pub fn leaderboard_order(entries: &[RankedPrefecture]) -> Vec<RankedPrefecture> {
    let mut sorted = entries.to_vec();
    sorted.sort_by(|a, b| {
        b.average_steps
            .cmp(&a.average_steps)
            .then_with(|| a.prefecture_id.cmp(&b.prefecture_id))
    });
    sorted
}

/// Rounded mean of the per-prefecture averages, empty prefectures included.
pub fn national_average(entries: &[RankedPrefecture]) -> u64 {
    let total: u64 = entries.iter().map(|e| e.average_steps).sum();
    rounded_mean(total, entries.len() as u64)
}

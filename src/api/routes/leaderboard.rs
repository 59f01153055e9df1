use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use crate::api::state::AppState;
use crate::api::views::{LeaderboardEntry, LeaderboardResponse};
use crate::api::ApiError;
use crate::calculate::{leaderboard_order, national_average};
use crate::models::{StatusCount, PREFECTURE_COUNT};

#[derive(Debug, Deserialize)]
pub struct LeaderboardParams {
    pub limit: Option<usize>,
}

/// Prefectures by average steps, highest first, with summary figures.
pub async fn leaderboard(
    State(state): State<AppState>,
    Query(params): Query<LeaderboardParams>,
) -> Result<Json<LeaderboardResponse>, ApiError> {
    let ranked = state.standings.list().await?;
    let limit = params
        .limit
        .unwrap_or(PREFECTURE_COUNT as usize)
        .clamp(1, PREFECTURE_COUNT as usize);
    let images = state.images.as_deref();

    let entries = leaderboard_order(&ranked)
        .iter()
        .take(limit)
        .map(|entry| LeaderboardEntry::new(entry, images))
        .collect();

    Ok(Json(LeaderboardResponse {
        entries,
        national_average: national_average(&ranked),
        status_count: StatusCount::tally(&ranked),
    }))
}

#[cfg(test)]
mod tests {
    use crate::api::build_router;
    use crate::api::test_support::{get_json, memory_state, post_json};
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_leaderboard_order_and_summary() {
        let state = memory_state();
        for (uuid, prefecture, steps) in [("a", 40, 2000), ("b", 1, 8000), ("c", 13, 2000), ("d", 27, 500)] {
            let body = json!({"uuid": uuid, "prefectureId": prefecture, "steps": steps}).to_string();
            post_json(build_router(state.clone()), "/steps", &body).await;
        }

        let (status, json) = get_json(build_router(state), "/leaderboard?limit=5").await;
        assert_eq!(status, StatusCode::OK);

        let entries = json["entries"].as_array().unwrap();
        assert_eq!(entries.len(), 5);
        let ids: Vec<u64> = entries
            .iter()
            .map(|e| e["prefectureId"].as_u64().unwrap())
            .collect();
        assert_eq!(ids, vec![1, 13, 40, 27, 2]);

        assert_eq!(entries[0]["rank"], 1);
        assert_eq!(entries[0]["name"], "北海道");
        assert_eq!(entries[0]["status"], 2);
        assert!(entries[4]["rank"].is_null());

        // (8000 + 2000 + 2000 + 500) / 47 = 265.9
        assert_eq!(json["nationalAverage"], 266);
        assert_eq!(json["statusCount"], json!({"high": 2, "mid": 2, "low": 43}));
    }

    #[tokio::test]
    async fn test_leaderboard_limit_is_clamped() {
        let (_, json) = get_json(build_router(memory_state()), "/leaderboard?limit=0").await;
        assert_eq!(json["entries"].as_array().unwrap().len(), 1);

        let (_, json) = get_json(build_router(memory_state()), "/leaderboard?limit=500").await;
        assert_eq!(json["entries"].as_array().unwrap().len(), 47);

        let (_, json) = get_json(build_router(memory_state()), "/leaderboard").await;
        assert_eq!(json["entries"].as_array().unwrap().len(), 47);
    }
}

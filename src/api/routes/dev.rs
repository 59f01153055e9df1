//! Developer routes for seeding and inspecting records. Mounted only when
//! `dev.enable_test_routes` is set.

use axum::extract::State;
use axum::Json;
use rand::Rng;
use serde::Serialize;

use crate::api::state::AppState;
use crate::api::ApiError;
use crate::models::{StepReport, UserRecord, PREFECTURE_COUNT};

const RECENT_LIMIT: usize = 10;

#[derive(Debug, Serialize)]
pub struct RecentUsersResponse {
    pub success: bool,
    pub count: usize,
    pub users: Vec<UserRecord>,
}

pub async fn recent_users(
    State(state): State<AppState>,
) -> Result<Json<RecentUsersResponse>, ApiError> {
    let users = state.standings.store().recent_users(RECENT_LIMIT).await?;
    Ok(Json(RecentUsersResponse {
        success: true,
        count: users.len(),
        users,
    }))
}

#[derive(Debug, Serialize)]
pub struct CreateUserResponse {
    pub success: bool,
    pub message: &'static str,
    pub user: UserRecord,
}

/// Insert a user with a random prefecture and step count.
pub async fn create_test_user(
    State(state): State<AppState>,
) -> Result<Json<CreateUserResponse>, ApiError> {
    let (prefecture_id, steps) = {
        let mut rng = rand::rng();
        (
            rng.random_range(1..=PREFECTURE_COUNT as i64),
            rng.random_range(0..10_000i64),
        )
    };
    let uuid = format!("test-{}", uuid::Uuid::new_v4());
    let report = StepReport::new(uuid, prefecture_id, steps)?;

    let user = state.standings.submit(&report).await?;

    Ok(Json(CreateUserResponse {
        success: true,
        message: "Test user created",
        user,
    }))
}

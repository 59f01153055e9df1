//! REST API endpoints.
//!
//! Axum-based HTTP API for reporting steps and reading the classified
//! prefecture standings.

pub mod routes;
pub mod state;
pub mod views;

use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use thiserror::Error;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::models::ValidationError;
use crate::standings::StandingsError;
use crate::storage::StorageError;
use state::AppState;

/// API error types.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Details are logged, never sent to the client.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl From<StandingsError> for ApiError {
    fn from(e: StandingsError) -> Self {
        match e {
            StandingsError::Validation(v) => ApiError::Validation(v),
            StandingsError::Store(s) => s.into(),
        }
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, field) = match &self {
            ApiError::Validation(v) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                v.to_string(),
                Some(v.field().to_string()),
            ),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", self.to_string(), None),
            ApiError::Internal(detail) => {
                tracing::error!("{}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "internal server error".to_string(),
                    None,
                )
            }
        };

        let body = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                field,
            },
        };

        (status, Json(body)).into_response()
    }
}

/// CORS policy for the configured origins. `"*"` allows any origin without
/// credentials; an explicit list allows credentials.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    if origins.iter().any(|o| o == "*") {
        return base.allow_origin(AllowOrigin::any());
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!("Ignoring invalid CORS origin {:?}: {}", o, e);
                None
            }
        })
        .collect();

    base.allow_origin(AllowOrigin::list(allowed))
        .allow_credentials(true)
}

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/health", get(routes::health::health))
        .route("/steps", post(routes::steps::report_steps))
        .route("/characters", get(routes::characters::list_characters))
        .route(
            "/characters/:prefecture_id",
            get(routes::characters::get_character),
        )
        .route("/leaderboard", get(routes::leaderboard::leaderboard));

    if state.dev_routes {
        tracing::warn!("Developer test routes are enabled");
        router = router
            .route("/test/users", get(routes::dev::recent_users))
            .route("/test/create-user", post(routes::dev::create_test_user));
    }

    let cors = cors_layer(&state.cors_origins);

    router
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tower::util::ServiceExt;

    use super::state::AppState;
    use crate::calculate::TierPolicy;
    use crate::models::{PrefectureStat, StepReport, UserRecord};
    use crate::standings::Standings;
    use crate::storage::{MemoryStore, StepStore, StorageError};

    /// Store whose every operation fails, as a full disk would.
    pub struct FailingStore;

    fn disk_error() -> StorageError {
        StorageError::Io(std::io::Error::other("disk /srv/state unavailable"))
    }

    #[async_trait::async_trait]
    impl StepStore for FailingStore {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn upsert_user(&self, _report: &StepReport) -> Result<UserRecord, StorageError> {
            Err(disk_error())
        }

        async fn group_by_prefecture(&self) -> Result<Vec<PrefectureStat>, StorageError> {
            Err(disk_error())
        }

        async fn recent_users(&self, _limit: usize) -> Result<Vec<UserRecord>, StorageError> {
            Err(disk_error())
        }
    }

    fn state_with(store: Arc<dyn StepStore>) -> AppState {
        AppState::new(
            Standings::new(store, TierPolicy::Compatible),
            None,
            vec!["http://localhost:5173".to_string()],
            false,
        )
    }

    pub fn memory_state() -> AppState {
        state_with(Arc::new(MemoryStore::new()))
    }

    pub fn failing_state() -> AppState {
        state_with(Arc::new(FailingStore))
    }

    pub async fn get_json(app: axum::Router, uri: &str) -> (StatusCode, Value) {
        let resp = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, json)
    }

    pub async fn post_json(app: axum::Router, uri: &str, body: &str) -> (StatusCode, Value) {
        let resp = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, json)
    }
}

use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use serde::Serialize;
use serde_json::Value;

use crate::api::state::AppState;
use crate::api::ApiError;
use crate::models::StepReport;

#[derive(Debug, Serialize)]
pub struct ReportResponse {
    pub success: bool,
}

/// Record a user's latest step count.
///
/// The body is parsed as untyped JSON so that a wrong field type is reported
/// as a validation failure on that field.
pub async fn report_steps(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ReportResponse>, ApiError> {
    let body: Value = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("invalid JSON body: {}", e)))?;
    let report = StepReport::from_json(&body)?;

    state.standings.submit(&report).await?;

    Ok(Json(ReportResponse { success: true }))
}

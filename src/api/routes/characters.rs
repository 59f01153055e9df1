use axum::extract::{Path, State};
use axum::Json;

use crate::api::state::AppState;
use crate::api::views::CharacterView;
use crate::api::ApiError;
use crate::models::{PrefectureId, ValidationError};

/// All 47 prefectures, ascending by id.
pub async fn list_characters(
    State(state): State<AppState>,
) -> Result<Json<Vec<CharacterView>>, ApiError> {
    let ranked = state.standings.list().await?;
    let images = state.images.as_deref();

    Ok(Json(
        ranked
            .iter()
            .map(|entry| CharacterView::new(entry, images))
            .collect(),
    ))
}

/// A single prefecture, classified against all others.
pub async fn get_character(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<CharacterView>, ApiError> {
    let prefecture_id = raw_id
        .trim()
        .parse::<i64>()
        .map_err(|_| ValidationError::InvalidPrefectureId)
        .and_then(PrefectureId::new)?;

    let entry = state.standings.get(prefecture_id).await?;

    Ok(Json(CharacterView::new(&entry, state.images.as_deref())))
}

//! Language registry handlers.

use axum::Json;
use axum::extract::State;
use axum::response::IntoResponse;
use serde::Deserialize;

use crate::domain::languages::LanguageMarker;

use super::language_to_api;
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::state::ApiState;

#[derive(Debug, Deserialize)]
pub struct LanguagesRequest {
    pub languages: Vec<LanguageMarker>,
}

pub async fn list_languages(State(state): State<ApiState>) -> Result<impl IntoResponse, ApiError> {
    let languages = state.languages.list().await.map_err(language_to_api)?;
    Ok(Json(languages))
}

pub async fn replace_languages(
    State(state): State<ApiState>,
    Json(payload): Json<LanguagesRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let languages = state
        .languages
        .replace(payload.languages)
        .await
        .map_err(language_to_api)?;
    Ok(Json(languages))
}

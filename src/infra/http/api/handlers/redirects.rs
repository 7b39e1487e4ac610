//! Redirect rule handlers.

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};

use crate::application::redirects::ImportRule;

use super::redirect_to_api;
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::state::ApiState;

#[derive(Debug, Deserialize)]
pub struct AddRedirectRequest {
    pub from: String,
    pub to: String,
    #[serde(rename = "type", default)]
    pub kind: Option<u16>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteRedirectQuery {
    pub from: String,
}

#[derive(Debug, Serialize)]
pub struct ImportResponse {
    pub imported: usize,
}

pub async fn export_redirects(State(state): State<ApiState>) -> Result<impl IntoResponse, ApiError> {
    let rules = state.redirects.export().await.map_err(redirect_to_api)?;
    Ok(Json(rules))
}

pub async fn add_redirect(
    State(state): State<ApiState>,
    Json(payload): Json<AddRedirectRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let rule = state
        .redirects
        .add(&payload.from, &payload.to, payload.kind)
        .await
        .map_err(redirect_to_api)?;
    Ok((StatusCode::CREATED, Json(rule)))
}

pub async fn delete_redirect(
    State(state): State<ApiState>,
    Query(query): Query<DeleteRedirectQuery>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .redirects
        .delete(&query.from)
        .await
        .map_err(redirect_to_api)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn import_redirects(
    State(state): State<ApiState>,
    Json(entries): Json<Vec<ImportRule>>,
) -> Result<impl IntoResponse, ApiError> {
    let imported = state
        .redirects
        .import(entries)
        .await
        .map_err(redirect_to_api)?;
    Ok(Json(ImportResponse { imported }))
}

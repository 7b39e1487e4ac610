//! Sitemap settings, preview tree and per-kind editing.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};

use crate::application::admin::sitemap::{OverrideUpdate, SitemapSettingsPatch};

use super::sitemap_to_api;
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::state::ApiState;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PreviewQuery {
    pub lang: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct IdListRequest {
    pub ids: Vec<i64>,
}

#[derive(Debug, Deserialize)]
pub struct OverridesRequest {
    pub items: Vec<OverrideUpdate>,
}

#[derive(Debug, Serialize)]
pub struct IdListResponse {
    pub kind: String,
    pub ids: Vec<i64>,
}

#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub updated: usize,
}

#[derive(Debug, Serialize)]
pub struct RegenerateResponse {
    pub invalidated: usize,
}

pub async fn get_sitemap_settings(
    State(state): State<ApiState>,
) -> Result<impl IntoResponse, ApiError> {
    let settings = state.sitemap.settings().await.map_err(sitemap_to_api)?;
    Ok(Json(settings))
}

pub async fn patch_sitemap_settings(
    State(state): State<ApiState>,
    Json(patch): Json<SitemapSettingsPatch>,
) -> Result<impl IntoResponse, ApiError> {
    let settings = state
        .sitemap
        .update_settings(patch)
        .await
        .map_err(sitemap_to_api)?;
    Ok(Json(settings))
}

pub async fn get_sitemap_tree(
    State(state): State<ApiState>,
) -> Result<impl IntoResponse, ApiError> {
    let tree = state.sitemap.tree().await.map_err(sitemap_to_api)?;
    Ok(Json(tree))
}

pub async fn preview_sitemap_kind(
    State(state): State<ApiState>,
    Path(kind): Path<String>,
    Query(query): Query<PreviewQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let lang = query
        .lang
        .as_deref()
        .map(str::trim)
        .filter(|lang| !lang.is_empty());
    let items = state
        .sitemap
        .preview(&kind, lang, query.limit)
        .await
        .map_err(sitemap_to_api)?;
    Ok(Json(items))
}

pub async fn put_sitemap_overrides(
    State(state): State<ApiState>,
    Path(kind): Path<String>,
    Json(payload): Json<OverridesRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let updated = state
        .sitemap
        .update_overrides(&kind, payload.items)
        .await
        .map_err(sitemap_to_api)?;
    Ok(Json(CountResponse { updated }))
}

pub async fn put_sitemap_order(
    State(state): State<ApiState>,
    Path(kind): Path<String>,
    Json(payload): Json<IdListRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let ids = state
        .sitemap
        .save_order(&kind, payload.ids)
        .await
        .map_err(sitemap_to_api)?;
    Ok(Json(IdListResponse { kind, ids }))
}

pub async fn put_sitemap_exclusions(
    State(state): State<ApiState>,
    Path(kind): Path<String>,
    Json(payload): Json<IdListRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let ids = state
        .sitemap
        .save_exclusions(&kind, payload.ids)
        .await
        .map_err(sitemap_to_api)?;
    Ok(Json(IdListResponse { kind, ids }))
}

pub async fn regenerate_sitemaps(State(state): State<ApiState>) -> impl IntoResponse {
    let invalidated = state.sitemap.regenerate().await;
    Json(RegenerateResponse { invalidated })
}

pub async fn get_sitemap_status(
    State(state): State<ApiState>,
) -> Result<impl IntoResponse, ApiError> {
    let status = state.sitemap.status().await.map_err(sitemap_to_api)?;
    Ok(Json(status))
}

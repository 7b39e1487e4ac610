//! Lifecycle notifications from the external content store.

use axum::Json;
use axum::extract::State;
use axum::response::IntoResponse;

use crate::application::admin::ContentEvent;

use super::content_event_to_api;
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::state::ApiState;

pub async fn post_content_event(
    State(state): State<ApiState>,
    Json(event): Json<ContentEvent>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state
        .content_events
        .handle(event)
        .await
        .map_err(content_event_to_api)?;
    Ok(Json(outcome))
}

//! Admin API handlers organized by resource.
//!
//! Error conversions shared across resources live here.

mod content;
mod languages;
mod redirects;
mod sitemap;

pub use content::*;
pub use languages::*;
pub use redirects::*;
pub use sitemap::*;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::application::admin::{AdminLanguageError, AdminSitemapError, ContentEventError};
use crate::application::catalog::CatalogError;
use crate::application::error::ErrorReport;
use crate::application::language::LanguageError;
use crate::application::redirects::RedirectError;
use crate::application::repos::RepoError;
use crate::application::settings::SettingsStoreError;

use super::error::{ApiError, codes};
use super::state::ApiState;

/// `204` when the store answers, `503` with a report otherwise.
pub async fn health(State(state): State<ApiState>) -> Response {
    let Some(db) = state.db.as_ref() else {
        return StatusCode::NO_CONTENT.into_response();
    };
    match db.health_check().await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(
                "infra::http::api::health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}

pub(crate) fn repo_to_api(err: RepoError) -> ApiError {
    match err {
        RepoError::Duplicate { constraint } => ApiError::new(
            StatusCode::CONFLICT,
            codes::DUPLICATE,
            "Duplicate record",
            Some(constraint),
        ),
        RepoError::NotFound => ApiError::not_found("resource not found"),
        RepoError::InvalidInput { message } => ApiError::new(
            StatusCode::BAD_REQUEST,
            codes::INVALID_INPUT,
            "Invalid input",
            Some(message),
        ),
        RepoError::Timeout => ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            codes::DB_TIMEOUT,
            "Database timeout",
            None,
        ),
        RepoError::Persistence(msg) => ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            codes::REPO,
            "Persistence error",
            Some(msg),
        ),
    }
}

pub(crate) fn settings_store_to_api(err: SettingsStoreError) -> ApiError {
    match err {
        SettingsStoreError::Repo(repo) => repo_to_api(repo),
        other @ SettingsStoreError::Encode { .. } => ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            codes::SETTINGS,
            "Settings could not be stored",
            Some(other.to_string()),
        ),
    }
}

fn language_lookup_to_api(err: LanguageError) -> ApiError {
    match err {
        LanguageError::Repo(repo) => repo_to_api(repo),
        LanguageError::Settings(settings) => settings_store_to_api(settings),
    }
}

pub(crate) fn sitemap_to_api(err: AdminSitemapError) -> ApiError {
    match err {
        AdminSitemapError::UnknownKind(kind) => ApiError::new(
            StatusCode::BAD_REQUEST,
            codes::UNKNOWN_KIND,
            "Unknown sitemap kind",
            Some(kind),
        ),
        AdminSitemapError::ConstraintViolation(message) => ApiError::new(
            StatusCode::BAD_REQUEST,
            codes::INVALID_INPUT,
            "Invalid sitemap settings",
            Some(message),
        ),
        err @ AdminSitemapError::ItemNotFound { .. } => ApiError::new(
            StatusCode::NOT_FOUND,
            codes::NOT_FOUND,
            "Item not found",
            Some(err.to_string()),
        ),
        AdminSitemapError::Catalog(CatalogError::Repo(repo)) | AdminSitemapError::Repo(repo) => {
            repo_to_api(repo)
        }
        AdminSitemapError::Catalog(CatalogError::Language(language))
        | AdminSitemapError::Language(language) => language_lookup_to_api(language),
        AdminSitemapError::Catalog(CatalogError::Settings(settings))
        | AdminSitemapError::Settings(settings) => settings_store_to_api(settings),
    }
}

pub(crate) fn language_to_api(err: AdminLanguageError) -> ApiError {
    match err {
        AdminLanguageError::Invalid(domain) => ApiError::new(
            StatusCode::BAD_REQUEST,
            codes::INVALID_LANGUAGE,
            "Invalid language registry",
            Some(domain.to_string()),
        ),
        AdminLanguageError::Settings(settings) => settings_store_to_api(settings),
    }
}

pub(crate) fn redirect_to_api(err: RedirectError) -> ApiError {
    match err {
        RedirectError::Validation(message) => ApiError::new(
            StatusCode::BAD_REQUEST,
            codes::INVALID_REDIRECT,
            "Invalid redirect",
            Some(message),
        ),
        RedirectError::LimitReached { max } => ApiError::new(
            StatusCode::CONFLICT,
            codes::REDIRECT_LIMIT,
            "Redirect limit reached",
            Some(format!("at most {max} rules can be stored")),
        ),
        RedirectError::NotFound(_) => ApiError::not_found("redirect not found"),
        RedirectError::Settings(settings) => settings_store_to_api(settings),
    }
}

pub(crate) fn content_event_to_api(err: ContentEventError) -> ApiError {
    match err {
        ContentEventError::Redirect(redirect) => redirect_to_api(redirect),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirect_errors_map_to_distinct_statuses() {
        let err = redirect_to_api(RedirectError::Validation("missing".into()));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), codes::INVALID_REDIRECT);

        let err = redirect_to_api(RedirectError::LimitReached { max: 500 });
        assert_eq!(err.status(), StatusCode::CONFLICT);

        let err = redirect_to_api(RedirectError::NotFound("/old".into()));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn nested_repo_errors_keep_their_status() {
        let err = sitemap_to_api(AdminSitemapError::Catalog(CatalogError::Repo(
            RepoError::Timeout,
        )));
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);

        let err = sitemap_to_api(AdminSitemapError::UnknownKind("widgets".into()));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), codes::UNKNOWN_KIND);
    }
}

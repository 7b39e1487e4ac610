pub mod error;
pub mod handlers;
pub mod state;

pub use state::ApiState;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post, put},
};

use crate::infra::http::middleware::{log_responses, set_request_context};

/// JSON admin API. Served on the admin listener only.
pub fn build_api_router(state: ApiState) -> Router {
    Router::new()
        .route(
            "/api/sitemap/settings",
            get(handlers::get_sitemap_settings).patch(handlers::patch_sitemap_settings),
        )
        .route("/api/sitemap/tree", get(handlers::get_sitemap_tree))
        .route(
            "/api/sitemap/preview/{kind}",
            get(handlers::preview_sitemap_kind),
        )
        .route(
            "/api/sitemap/overrides/{kind}",
            put(handlers::put_sitemap_overrides),
        )
        .route("/api/sitemap/order/{kind}", put(handlers::put_sitemap_order))
        .route(
            "/api/sitemap/exclusions/{kind}",
            put(handlers::put_sitemap_exclusions),
        )
        .route(
            "/api/sitemap/regenerate",
            post(handlers::regenerate_sitemaps),
        )
        .route("/api/sitemap/status", get(handlers::get_sitemap_status))
        .route(
            "/api/languages",
            get(handlers::list_languages).put(handlers::replace_languages),
        )
        .route(
            "/api/redirects",
            get(handlers::export_redirects)
                .post(handlers::add_redirect)
                .put(handlers::import_redirects)
                .delete(handlers::delete_redirect),
        )
        .route("/api/content/events", post(handlers::post_content_event))
        .route("/_health", get(handlers::health))
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}

use std::sync::Arc;

use crate::application::admin::{AdminLanguageService, AdminSitemapService, ContentEventService};
use crate::application::redirects::RedirectMatcher;
use crate::infra::db::PostgresRepositories;

#[derive(Clone)]
pub struct ApiState {
    pub sitemap: Arc<AdminSitemapService>,
    pub languages: Arc<AdminLanguageService>,
    pub redirects: Arc<RedirectMatcher>,
    pub content_events: Arc<ContentEventService>,
    /// `None` when serving from the in-memory store.
    pub db: Option<Arc<PostgresRepositories>>,
}

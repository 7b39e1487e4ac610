//! Service wiring shared by the binary and the integration tests.

use std::{sync::Arc, time::Duration};

use crate::{
    application::{
        admin::{AdminLanguageService, AdminSitemapService, ContentEventService},
        catalog::{ContentCatalog, SiteUrls},
        dispatch::Dispatcher,
        language::LanguageResolver,
        redirects::RedirectMatcher,
        repos::{AuthorsRepo, ContentRepo, SettingsRepo, TaxonomyRepo},
        settings::SettingsStore,
        sitemap::SitemapService,
    },
    cache::{CacheConfig, CacheTrigger, SitemapCache},
    config::Settings,
    domain::{languages::LanguageMarker, redirects::MAX_REDIRECTS},
    infra::{
        db::PostgresRepositories,
        http::{ApiState, HttpState},
        memory::MemoryRepositories,
    },
};

/// The repository set every service is built from.
#[derive(Clone)]
pub struct Repositories {
    pub content: Arc<dyn ContentRepo>,
    pub taxonomy: Arc<dyn TaxonomyRepo>,
    pub authors: Arc<dyn AuthorsRepo>,
    pub settings: Arc<dyn SettingsRepo>,
    pub db: Option<Arc<PostgresRepositories>>,
}

impl Repositories {
    pub fn postgres(repositories: Arc<PostgresRepositories>) -> Self {
        Self {
            content: repositories.clone(),
            taxonomy: repositories.clone(),
            authors: repositories.clone(),
            settings: repositories.clone(),
            db: Some(repositories),
        }
    }

    pub fn memory(repositories: &MemoryRepositories) -> Self {
        Self {
            content: repositories.content.clone(),
            taxonomy: repositories.taxonomy.clone(),
            authors: repositories.authors.clone(),
            settings: repositories.settings.clone(),
            db: None,
        }
    }
}

/// The subset of [`Settings`] the services need.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub public_url: String,
    pub admin_url: String,
    pub default_language: LanguageMarker,
    pub cache: CacheConfig,
    pub stylesheet_max_age: Duration,
    pub redirect_max_rules: usize,
    pub redirect_hit_tracking: bool,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            public_url: "http://127.0.0.1:3000".to_string(),
            admin_url: "http://127.0.0.1:3001".to_string(),
            default_language: LanguageMarker::new("en", "English").as_default(),
            cache: CacheConfig::default(),
            stylesheet_max_age: Duration::from_secs(86_400),
            redirect_max_rules: MAX_REDIRECTS,
            redirect_hit_tracking: true,
        }
    }
}

impl From<&Settings> for ServiceSettings {
    fn from(settings: &Settings) -> Self {
        Self {
            public_url: settings.site.public_url.to_string(),
            admin_url: settings.site.admin_url.to_string(),
            default_language: settings.site.default_language.clone(),
            cache: CacheConfig::from(&settings.sitemap),
            stylesheet_max_age: settings.sitemap.stylesheet_max_age,
            redirect_max_rules: settings.redirects.max_rules,
            redirect_hit_tracking: settings.redirects.hit_tracking,
        }
    }
}

#[derive(Clone)]
pub struct ApplicationContext {
    pub http_state: HttpState,
    pub api_state: ApiState,
    pub cache_trigger: Arc<CacheTrigger>,
}

pub fn build_application_context(
    repositories: Repositories,
    settings: &ServiceSettings,
) -> ApplicationContext {
    let store = SettingsStore::new(repositories.settings.clone());
    let languages = LanguageResolver::new(
        store.clone(),
        repositories.taxonomy.clone(),
        settings.default_language.clone(),
    );
    let catalog = ContentCatalog::new(
        repositories.content.clone(),
        repositories.taxonomy.clone(),
        repositories.authors.clone(),
        languages.clone(),
        store.clone(),
        SiteUrls::new(&settings.public_url, &settings.admin_url),
    );

    let cache = Arc::new(SitemapCache::new(&settings.cache));
    let cache_trigger = Arc::new(CacheTrigger::new(cache.clone(), languages));
    let redirects = Arc::new(RedirectMatcher::new(
        store.clone(),
        settings.redirect_max_rules,
        settings.redirect_hit_tracking,
    ));

    let sitemap = SitemapService::new(catalog.clone(), store.clone());
    let dispatcher = Dispatcher::new(sitemap, cache, redirects.clone(), store.clone());

    let admin_sitemap = AdminSitemapService::new(
        catalog,
        store.clone(),
        repositories.content,
        repositories.taxonomy,
        repositories.authors,
        cache_trigger.clone(),
    );
    let admin_languages = AdminLanguageService::new(store, cache_trigger.clone());
    let content_events = ContentEventService::new(cache_trigger.clone(), redirects.clone());

    ApplicationContext {
        http_state: HttpState {
            dispatcher: Arc::new(dispatcher),
            stylesheet_max_age: settings.stylesheet_max_age,
        },
        api_state: ApiState {
            sitemap: Arc::new(admin_sitemap),
            languages: Arc::new(admin_languages),
            redirects,
            content_events: Arc::new(content_events),
            db: repositories.db,
        },
        cache_trigger,
    }
}

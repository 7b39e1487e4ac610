#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Method, Request, Response, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::Value;
use time::macros::datetime;
use tower::ServiceExt;
use waymark::application::settings::{LANGUAGES_KEY, LanguageList, SITEMAP_KEY, SitemapSettings};
use waymark::domain::entities::{AuthorRecord, ContentRecord, ItemOverrides, TermRecord};
use waymark::domain::languages::LanguageMarker;
use waymark::domain::types::{ContentStatus, ContentType, Taxonomy};
use waymark::infra::bootstrap::{
    ApplicationContext, Repositories, ServiceSettings, build_application_context,
};
use waymark::infra::http::{build_api_router, build_router};
use waymark::infra::memory::{MemoryRepositories, MemorySeed};

pub const UNCATEGORIZED: i64 = 1;
pub const EN_CATEGORY: i64 = 20;
pub const FR_CATEGORY: i64 = 12;
pub const FR_TAG: i64 = 9;

pub struct TestSite {
    pub public: Router,
    pub admin: Router,
    pub repos: MemoryRepositories,
    pub context: ApplicationContext,
}

impl TestSite {
    pub async fn get(&self, path: &str) -> Response<Body> {
        send(&self.public, Method::GET, path, None).await
    }

    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let response = self.get(path).await;
        let status = response.status();
        (status, body_text(response).await)
    }

    pub async fn admin(&self, method: Method, path: &str, body: Option<Value>) -> Response<Body> {
        send(&self.admin, method, path, body).await
    }

    pub async fn admin_json(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let response = self.admin(method, path, body).await;
        let status = response.status();
        let text = body_text(response).await;
        let value = if text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).expect("admin responses are json")
        };
        (status, value)
    }
}

pub async fn send(router: &Router, method: Method, path: &str, body: Option<Value>) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(path);
    let body = match body {
        Some(value) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };
    router
        .clone()
        .oneshot(builder.body(body).expect("request builds"))
        .await
        .expect("router is infallible")
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body collects")
        .to_bytes();
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

pub fn url_count(xml: &str) -> usize {
    xml.matches("<url>").count()
}

pub fn site_from_seed(seed: MemorySeed) -> TestSite {
    site_with_settings(seed, &ServiceSettings::default())
}

pub fn site_with_settings(seed: MemorySeed, settings: &ServiceSettings) -> TestSite {
    let repos = seed.into_repositories();
    let context = build_application_context(Repositories::memory(&repos), settings);
    TestSite {
        public: build_router(context.http_state.clone()),
        admin: build_api_router(context.api_state.clone()),
        repos,
        context,
    }
}

/// English plus French. Posts carry French through category 12 (children
/// 13 and 14) or tag 9, English through category 20.
pub fn bilingual_site() -> TestSite {
    site_from_seed(bilingual_seed())
}

/// Same content with an empty language registry.
pub fn monolingual_site() -> TestSite {
    let mut seed = bilingual_seed();
    seed.settings.remove(LANGUAGES_KEY);
    site_from_seed(seed)
}

pub fn bilingual_seed() -> MemorySeed {
    let languages = LanguageList {
        languages: vec![
            LanguageMarker::new("en", "English").as_default(),
            LanguageMarker::new("fr", "Français"),
        ],
    };
    let sitemap = SitemapSettings {
        uncategorized_id: Some(UNCATEGORIZED),
        ..SitemapSettings::default()
    };

    let mut seed = MemorySeed {
        content: vec![
            post(100, "bonjour", vec![13], Vec::new(), Some(1)),
            post(101, "salut", vec![UNCATEGORIZED], vec![FR_TAG], Some(1)),
            post(102, "hello", vec![EN_CATEGORY], Vec::new(), Some(2)),
            post(103, "coucou", vec![14], Vec::new(), Some(1)),
            ContentRecord {
                status: ContentStatus::Draft,
                ..post(104, "brouillon", vec![FR_CATEGORY], Vec::new(), Some(1))
            },
            page(200, "about", "en", Some("about")),
            page(201, "a-propos", "fr", Some("about")),
        ],
        terms: vec![
            term(UNCATEGORIZED, Taxonomy::Category, "uncategorized", "Uncategorized", None),
            term(FR_CATEGORY, Taxonomy::Category, "fr", "Français", None),
            term(13, Taxonomy::Category, "actualites", "Actualités", Some(FR_CATEGORY)),
            term(14, Taxonomy::Category, "sport", "Sport", Some(13)),
            term(EN_CATEGORY, Taxonomy::Category, "en", "English", None),
            term(FR_TAG, Taxonomy::Tag, "fr", "FR", None),
        ],
        authors: vec![author(1, "camille"), author(2, "sam")],
        ..MemorySeed::default()
    };
    seed.settings.insert(
        LANGUAGES_KEY.to_string(),
        serde_json::to_value(&languages).expect("languages encode"),
    );
    seed.settings.insert(
        SITEMAP_KEY.to_string(),
        serde_json::to_value(&sitemap).expect("sitemap settings encode"),
    );
    seed
}

pub fn post(
    id: i64,
    slug: &str,
    category_ids: Vec<i64>,
    tag_ids: Vec<i64>,
    author_id: Option<i64>,
) -> ContentRecord {
    ContentRecord {
        id,
        content_type: ContentType::post(),
        slug: slug.to_string(),
        title: slug.to_string(),
        path: format!("/{slug}"),
        parent_id: None,
        author_id,
        status: ContentStatus::Published,
        published_at: Some(datetime!(2026-03-01 09:00 UTC)),
        modified_at: Some(datetime!(2026-03-02 09:00 UTC)),
        language: None,
        category_ids,
        tag_ids,
        translation_group: None,
        images: Vec::new(),
        overrides: ItemOverrides::default(),
    }
}

pub fn page(id: i64, slug: &str, language: &str, group: Option<&str>) -> ContentRecord {
    ContentRecord {
        content_type: ContentType::page(),
        language: Some(language.to_string()),
        translation_group: group.map(str::to_string),
        author_id: None,
        ..post(id, slug, Vec::new(), Vec::new(), None)
    }
}

pub fn term(id: i64, taxonomy: Taxonomy, slug: &str, name: &str, parent_id: Option<i64>) -> TermRecord {
    TermRecord {
        id,
        taxonomy,
        slug: slug.to_string(),
        name: name.to_string(),
        path: format!("/{}/{slug}", taxonomy.as_str()),
        parent_id,
        modified_at: None,
        overrides: ItemOverrides::default(),
    }
}

fn author(id: i64, slug: &str) -> AuthorRecord {
    AuthorRecord {
        id,
        slug: slug.to_string(),
        display_name: slug.to_string(),
        path: format!("/author/{slug}"),
        last_post_modified: None,
        overrides: ItemOverrides::default(),
    }
}

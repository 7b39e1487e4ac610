mod common;

use axum::http::{Method, StatusCode};
use serde_json::{Value, json};

use common::{bilingual_site, url_count};

fn ids(preview: &Value) -> Vec<i64> {
    preview
        .as_array()
        .expect("preview array")
        .iter()
        .map(|item| item["id"].as_i64().expect("id"))
        .collect()
}

#[tokio::test]
async fn health_is_no_content_in_memory_mode() {
    let site = bilingual_site();
    let response = site.admin(Method::GET, "/_health", None).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn status_reports_languages_and_cache() {
    let site = bilingual_site();
    site.get("/sitemap_index.xml").await;

    let (status, body) = site.admin_json(Method::GET, "/api/sitemap/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["enabled"], json!(true));
    assert_eq!(body["languages"], json!(["en", "fr"]));
    assert_eq!(body["index_url"], json!("http://127.0.0.1:3000/sitemap_index.xml"));
    assert_eq!(body["cached_entries"], json!(1));

    let (status, body) = site
        .admin_json(Method::POST, "/api/sitemap/regenerate", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["invalidated"], json!(1));

    let (_, body) = site.admin_json(Method::GET, "/api/sitemap/status", None).await;
    assert_eq!(body["cached_entries"], json!(0));
}

#[tokio::test]
async fn tree_has_one_node_per_language() {
    let site = bilingual_site();
    let (_, tree) = site.admin_json(Method::GET, "/api/sitemap/tree", None).await;
    let languages = tree["languages"].as_array().expect("languages");
    assert_eq!(languages.len(), 2);
    assert_eq!(languages[0]["iso2"], json!("en"));
    assert_eq!(
        languages[1]["sitemap_url"],
        json!("http://127.0.0.1:3000/francais.xml")
    );

    let posts = languages[1]["kinds"]
        .as_array()
        .expect("kinds")
        .iter()
        .find(|kind| kind["kind"] == json!("post"))
        .expect("post node");
    assert_eq!(posts["count"], json!(3));
    assert_eq!(posts["url"], json!("http://127.0.0.1:3000/post-fr.xml"));
}

#[tokio::test]
async fn preview_reports_effective_values_and_sources() {
    let site = bilingual_site();
    let (status, preview) = site
        .admin_json(Method::GET, "/api/sitemap/preview/post?lang=fr&limit=2", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let items = preview.as_array().expect("items");
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["priority"], json!("auto"));
    assert_eq!(items[0]["priority_source"], json!("default"));
    assert_eq!(
        items[0]["edit_url"],
        json!(format!("http://127.0.0.1:3001/content/{}/edit", items[0]["id"]))
    );
}

#[tokio::test]
async fn unknown_kind_is_a_bad_request() {
    let site = bilingual_site();
    let (status, body) = site
        .admin_json(Method::GET, "/api/sitemap/preview/Widgets", None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], json!("unknown_kind"));
    assert_eq!(body["error"]["hint"], json!("Widgets"));
}

#[tokio::test]
async fn overrides_apply_all_or_nothing() {
    let site = bilingual_site();
    let (status, body) = site
        .admin_json(
            Method::PUT,
            "/api/sitemap/overrides/post",
            Some(json!({"items": [
                {"id": 100, "priority": "0.9"},
                {"id": 999, "excluded": true}
            ]})),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], json!("not_found"));

    let (_, preview) = site
        .admin_json(Method::GET, "/api/sitemap/preview/post?lang=fr", None)
        .await;
    let bonjour = preview
        .as_array()
        .expect("items")
        .iter()
        .find(|item| item["id"] == json!(100))
        .expect("post 100");
    assert_eq!(bonjour["priority"], json!("auto"));

    let (status, body) = site
        .admin_json(
            Method::PUT,
            "/api/sitemap/overrides/post",
            Some(json!({"items": [{"id": 100, "priority": "0.9", "changefreq": "daily"}]})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["updated"], json!(1));

    let (_, preview) = site
        .admin_json(Method::GET, "/api/sitemap/preview/post?lang=fr", None)
        .await;
    let bonjour = preview
        .as_array()
        .expect("items")
        .iter()
        .find(|item| item["id"] == json!(100))
        .expect("post 100");
    assert_eq!(bonjour["effective_priority"], json!("0.9"));
    assert_eq!(bonjour["priority_source"], json!("item"));
    assert_eq!(bonjour["effective_changefreq"], json!("daily"));

    let (_, body) = site.get_text("/post-fr.xml").await;
    assert!(body.contains("<priority>0.9</priority>"));
    assert!(body.contains("<changefreq>daily</changefreq>"));
}

#[tokio::test]
async fn excluded_items_leave_sitemap_and_preview() {
    let site = bilingual_site();
    site.get("/post-fr.xml").await;

    let (status, body) = site
        .admin_json(
            Method::PUT,
            "/api/sitemap/exclusions/post",
            Some(json!({"ids": [100, 100]})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"kind": "post", "ids": [100]}));

    let (_, xml) = site.get_text("/post-fr.xml").await;
    assert_eq!(url_count(&xml), 2);
    assert!(!xml.contains("/bonjour"));

    let (_, preview) = site
        .admin_json(Method::GET, "/api/sitemap/preview/post?lang=fr", None)
        .await;
    assert!(!ids(&preview).contains(&100));
}

#[tokio::test]
async fn custom_order_goes_first() {
    let site = bilingual_site();
    let (_, preview) = site
        .admin_json(Method::GET, "/api/sitemap/preview/post?lang=fr", None)
        .await;
    assert_eq!(ids(&preview), vec![103, 101, 100]);

    let (status, _) = site
        .admin_json(
            Method::PUT,
            "/api/sitemap/order/post",
            Some(json!({"ids": [100]})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, preview) = site
        .admin_json(Method::GET, "/api/sitemap/preview/post?lang=fr", None)
        .await;
    assert_eq!(ids(&preview), vec![100, 103, 101]);
}

#[tokio::test]
async fn kind_defaults_apply_below_item_overrides() {
    let site = bilingual_site();
    let (status, settings) = site
        .admin_json(
            Method::PATCH,
            "/api/sitemap/settings",
            Some(json!({"kind_defaults": {"tag": {"priority": "0.2"}}})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(settings["kind_defaults"]["tag"]["priority"], json!("0.2"));

    let (_, preview) = site
        .admin_json(Method::GET, "/api/sitemap/preview/tag?lang=fr", None)
        .await;
    assert_eq!(preview[0]["effective_priority"], json!("0.2"));
    assert_eq!(preview[0]["priority_source"], json!("global"));
}

#[tokio::test]
async fn language_registry_is_validated() {
    let site = bilingual_site();
    let (status, body) = site
        .admin_json(
            Method::PUT,
            "/api/languages",
            Some(json!({"languages": [
                {"iso2": "en", "native_name": "English", "is_default": true},
                {"iso2": "fr", "native_name": "Français", "is_default": true}
            ]})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], json!("invalid_language"));

    let (status, body) = site
        .admin_json(
            Method::PUT,
            "/api/languages",
            Some(json!({"languages": [
                {"iso2": "EN", "native_name": "English", "is_default": true},
                {"iso2": "de", "native_name": "Deutsch"}
            ]})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["iso2"], json!("en"));
    assert_eq!(body[1]["slug"], json!("deutsch"));

    let (_, index) = site.get_text("/sitemap_index.xml").await;
    assert!(index.contains("/deutsch.xml"));
    assert!(!index.contains("/francais.xml"));
}

#[tokio::test]
async fn malformed_json_is_rejected() {
    let site = bilingual_site();
    let response = site
        .admin(
            Method::POST,
            "/api/content/events",
            Some(json!({"event": "exploded"})),
        )
        .await;
    assert!(response.status().is_client_error());
}

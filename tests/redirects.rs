mod common;

use axum::http::{Method, StatusCode, header};
use serde_json::{Value, json};
use waymark::infra::bootstrap::ServiceSettings;

use common::{bilingual_seed, bilingual_site, site_with_settings};

async fn add(site: &common::TestSite, rule: Value) -> (StatusCode, Value) {
    site.admin_json(Method::POST, "/api/redirects", Some(rule)).await
}

fn location(response: &axum::http::Response<axum::body::Body>) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .expect("location header")
}

#[tokio::test]
async fn trailing_slash_matches_exact_rule() {
    let site = bilingual_site();
    let (status, rule) = add(&site, json!({"from": "/old-page", "to": "/new-page", "type": 301})).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(rule["type"], json!(301));
    assert_eq!(rule["hits"], json!(0));

    let response = site.get("/old-page/").await;
    assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(location(&response), "/new-page");
}

#[tokio::test]
async fn first_matching_rule_wins() {
    let site = bilingual_site();
    add(&site, json!({"from": "/a", "to": "/x"})).await;
    add(&site, json!({"from": "~^/a", "to": "/y", "type": 302})).await;

    let response = site.get("/a").await;
    assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(location(&response), "/x");

    let response = site.get("/abc").await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/y");
}

#[tokio::test]
async fn regex_targets_expand_captures() {
    let site = bilingual_site();
    add(
        &site,
        json!({"from": "~^/blog/(\\d{4})/([a-z-]+)$", "to": "/$2-$1", "type": 302}),
    )
    .await;

    let response = site.get("/blog/2024/hello-world").await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/hello-world-2024");
}

#[tokio::test]
async fn invalid_patterns_are_rejected_on_add() {
    let site = bilingual_site();
    let (status, body) = add(&site, json!({"from": "~(", "to": "/x"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], json!("invalid_redirect"));

    let (status, body) = add(&site, json!({"from": "  ", "to": "/x"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], json!("invalid_redirect"));
}

#[tokio::test]
async fn hits_are_counted() {
    let site = bilingual_site();
    add(&site, json!({"from": "/counted", "to": "/target"})).await;
    site.get("/counted").await;

    let mut hits = Value::Null;
    for _ in 0..100 {
        tokio::task::yield_now().await;
        let (_, rules) = site.admin_json(Method::GET, "/api/redirects", None).await;
        hits = rules[0]["hits"].clone();
        if hits == json!(1) {
            break;
        }
    }
    assert_eq!(hits, json!(1));
}

#[tokio::test]
async fn limit_is_enforced() {
    let settings = ServiceSettings {
        redirect_max_rules: 2,
        ..ServiceSettings::default()
    };
    let site = site_with_settings(bilingual_seed(), &settings);
    add(&site, json!({"from": "/one", "to": "/1"})).await;
    add(&site, json!({"from": "/two", "to": "/2"})).await;

    let (status, body) = add(&site, json!({"from": "/three", "to": "/3"})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], json!("redirect_limit"));

    let (status, _) = add(&site, json!({"from": "/two", "to": "/deux"})).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn delete_removes_rule() {
    let site = bilingual_site();
    add(&site, json!({"from": "/gone", "to": "/here"})).await;

    let response = site.admin(Method::DELETE, "/api/redirects?from=/gone", None).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let (status, _) = site.get_text("/gone").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let response = site.admin(Method::DELETE, "/api/redirects?from=/gone", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn import_replaces_everything_or_nothing() {
    let site = bilingual_site();
    add(&site, json!({"from": "/kept", "to": "/k"})).await;

    let (status, _) = site
        .admin_json(
            Method::PUT,
            "/api/redirects",
            Some(json!([{"from": "/a", "to": "/b"}, {"from": "/c"}])),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (_, rules) = site.admin_json(Method::GET, "/api/redirects", None).await;
    assert_eq!(rules.as_array().expect("rules").len(), 1);
    assert_eq!(rules[0]["from"], json!("/kept"));

    let (status, body) = site
        .admin_json(
            Method::PUT,
            "/api/redirects",
            Some(json!([
                {"from": "/a", "to": "/b", "type": 302, "hits": 7},
                {"from": "/a", "to": "/c"},
                {"from": "/d", "to": "/e"}
            ])),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["imported"], json!(2));

    let (_, rules) = site.admin_json(Method::GET, "/api/redirects", None).await;
    assert_eq!(
        rules,
        json!([
            {"from": "/a", "to": "/c", "type": 301, "hits": 0},
            {"from": "/d", "to": "/e", "type": 301, "hits": 0}
        ])
    );

    let response = site.get("/kept").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn renamed_published_post_gets_a_redirect() {
    let site = bilingual_site();
    let (status, outcome) = site
        .admin_json(
            Method::POST,
            "/api/content/events",
            Some(json!({
                "event": "renamed",
                "content_type": "post",
                "status": "published",
                "old_path": "/bonjour",
                "new_path": "/bonjour-monde"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["redirect_created"], json!(true));

    let response = site.get("/bonjour").await;
    assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(location(&response), "/bonjour-monde");

    let (_, outcome) = site
        .admin_json(
            Method::POST,
            "/api/content/events",
            Some(json!({
                "event": "renamed",
                "content_type": "post",
                "status": "draft",
                "old_path": "/brouillon",
                "new_path": "/brouillon-2"
            })),
        )
        .await;
    assert_eq!(outcome["redirect_created"], json!(false));
}

#[tokio::test]
async fn sitemap_documents_take_precedence_over_rules() {
    let site = bilingual_site();
    add(&site, json!({"from": "/sitemap_index.xml", "to": "/elsewhere"})).await;

    let response = site.get("/sitemap_index.xml").await;
    assert_eq!(response.status(), StatusCode::OK);
}

//! Routes of the proxy exercised against a mocked content API.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use presscache_core::config::{Endpoints, HttpOptions, ServerConfig};
use presscache_core::{CachePolicy, Config, FetchCache, SessionOptions};
use presscache_server::render::STALE_HEADER;
use presscache_server::{build_cache, open_session, router, AppState};
use serde_json::json;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "tok-1";

fn config(server: &MockServer) -> Config {
    Config {
        api_host: server.uri(),
        user: Some("editor".into()),
        pass: Some("hunter2".into()),
        auth_key: None,
        endpoints: Endpoints::default(),
        server: ServerConfig::default(),
        http: HttpOptions {
            timeout_secs: 5,
            rate_limit_retries: 0,
        },
        session: SessionOptions::default(),
        cache: CachePolicy::default(),
        log_dir: None,
    }
}

async fn mount_auth(server: &MockServer, login_status: u16) {
    Mock::given(method("POST"))
        .and(path("/auth/token"))
        .respond_with(ResponseTemplate::new(login_status).set_body_json(json!({"token": TOKEN})))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/token/validate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": "jwt_auth_valid_token"})))
        .mount(server)
        .await;
}

async fn app(server: &MockServer) -> (Router, Arc<FetchCache>) {
    let config = config(server);
    let cache = Arc::new(build_cache(&config).unwrap());
    open_session(cache.session(), config.auth_key.as_deref()).await;
    (router(AppState { cache: cache.clone() }), cache)
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Option<String>, String) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let stale = response
        .headers()
        .get(STALE_HEADER)
        .map(|v| v.to_str().unwrap().to_string());
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, stale, String::from_utf8(body.to_vec()).unwrap())
}

#[tokio::test]
async fn root_is_invalid_request() {
    let server = MockServer::start().await;
    mount_auth(&server, 200).await;
    let (app, _) = app(&server).await;

    let (status, _, body) = get(&app, "/").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("Invalid request"));

    let (status, _, _) = get(&app, "/posts/5/extra").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn content_page_then_stale_copy() {
    let server = MockServer::start().await;
    mount_auth(&server, 200).await;
    Mock::given(method("GET"))
        .and(path("/content/posts/5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "title": {"rendered": "Hello <em>there</em>"},
            "content": {"rendered": "<p>Body</p>"}
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/content/posts/5"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let (app, cache) = app(&server).await;

    let (status, stale, body) = get(&app, "/posts/5").await;
    assert_eq!(status, StatusCode::OK);
    assert!(stale.is_none());
    assert!(body.contains("<title>Hello there</title>"));
    assert!(body.contains("<h1>Hello <em>there</em></h1>"));
    assert!(body.contains("<p>Body</p>"));

    let (status, stale, body) = get(&app, "/posts/5").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stale.as_deref(), Some("just now"));
    assert!(body.contains("<p>Body</p>"));
    assert_eq!(cache.stats().stale, 1);
}

#[tokio::test]
async fn upstream_errors_map_to_statuses() {
    let server = MockServer::start().await;
    mount_auth(&server, 200).await;
    Mock::given(method("GET"))
        .and(path("/content/posts/404"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"code": "rest_post_invalid_id"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/content/posts/500"))
        .respond_with(ResponseTemplate::new(500).set_body_string("<b>boom</b>"))
        .mount(&server)
        .await;
    let (app, _) = app(&server).await;

    let (status, _, body) = get(&app, "/posts/404").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("Failed to load content"));

    let (status, _, body) = get(&app, "/posts/500").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body.contains("&lt;b&gt;boom&lt;/b&gt;"));
    assert!(!body.contains("<b>boom</b>"));

    let (status, _, _) = get(&app, "/posts/bad.id").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn failed_startup_login_answers_no_open_session() {
    let server = MockServer::start().await;
    mount_auth(&server, 403).await;
    let (app, _) = app(&server).await;

    let (status, _, body) = get(&app, "/posts/5").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body.contains("No open session"));
}

#[tokio::test]
async fn configured_auth_key_skips_login() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "other"})))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/token/validate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": "jwt_auth_valid_token"})))
        .mount(&server)
        .await;

    let mut config = config(&server);
    config.auth_key = Some("saved-key".into());
    let cache = build_cache(&config).unwrap();
    open_session(cache.session(), config.auth_key.as_deref()).await;

    let bearer = cache.session().ensure_open().unwrap();
    assert_eq!(bearer.as_str(), "saved-key");
}

#[tokio::test]
async fn status_reports_session_and_counters() {
    let server = MockServer::start().await;
    mount_auth(&server, 200).await;
    let (app, _) = app(&server).await;

    let (status, _, body) = get(&app, "/_status").await;
    assert_eq!(status, StatusCode::OK);
    let report: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(report["session"], "valid");
    assert_eq!(report["cached_items"], 0);
    assert_eq!(report["open_attempts"], 1);
}

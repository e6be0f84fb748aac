//! API integration tests
#![allow(clippy::disallowed_methods)]

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use infosrv::{create_routes, AppState};
use remote_rules::test_utils::StaticFetcher;
use remote_rules::{MemorySourceStore, RemoteInfo, SourceDefaults};
use serde_json::{json, Value};
use tower::util::ServiceExt;

const URL: &str = "http://rules.example/bot.txt";

struct TestApp {
    app: Router,
    remote: Arc<RemoteInfo>,
    fetcher: Arc<StaticFetcher>,
}

fn create_test_app() -> TestApp {
    let fetcher = Arc::new(StaticFetcher::new());
    let remote = Arc::new(RemoteInfo::new(
        Arc::new(MemorySourceStore::new()),
        fetcher.clone(),
        SourceDefaults::default(),
    ));
    let scheduler = Arc::new(remote.scheduler(Duration::from_secs(30)));
    let app = create_routes(AppState::new(Arc::clone(&remote), scheduler));

    TestApp {
        app,
        remote,
        fetcher,
    }
}

/// Helper to make JSON requests
async fn json_request(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let request = if let Some(json) = body {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&json).unwrap()))
            .unwrap()
    } else {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    };

    let response = app.clone().oneshot(request).await.unwrap();

    let status = response.status();
    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();

    let body: Value = if body_bytes.is_empty() {
        json!({})
    } else {
        serde_json::from_slice(&body_bytes).unwrap()
    };

    (status, body)
}

#[tokio::test]
async fn test_health_check() {
    let t = create_test_app();

    let (status, body) = json_request(&t.app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["service"], "infosrv");
    // Scheduler is not started in tests
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["checks"]["store"]["status"], "healthy");
}

#[tokio::test]
async fn test_add_list_remove_source() {
    let t = create_test_app();
    t.fetcher.set_document(URL, "<g> ping => pong\nhello => hi there");

    let (status, body) = json_request(
        &t.app,
        "POST",
        "/api/sources",
        Some(json!({ "url": URL, "interval": "10m" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["interval_secs"], 600);

    t.remote.wait_for_refresh(URL).await;

    let (status, body) = json_request(&t.app, "GET", "/api/sources", None).await;
    assert_eq!(status, StatusCode::OK);
    let sources = body["data"].as_array().unwrap();
    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0]["url"], URL);
    assert_eq!(sources[0]["interval"], "10 minutes");
    assert_eq!(sources[0]["rule_count"], 2);

    let uri = format!("/api/sources?url={}", URL);
    let (status, _) = json_request(&t.app, "DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = json_request(&t.app, "DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], 404);
}

#[tokio::test]
async fn test_add_source_errors() {
    let t = create_test_app();
    t.fetcher.set_document(URL, "");

    let (status, body) = json_request(
        &t.app,
        "POST",
        "/api/sources",
        Some(json!({ "url": URL, "interval": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["field_errors"]["interval"].is_array());

    let (status, _) = json_request(
        &t.app,
        "POST",
        "/api/sources",
        Some(json!({ "url": URL, "interval": "soon" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = json_request(
        &t.app,
        "POST",
        "/api/sources",
        Some(json!({ "url": URL, "pattern": "(?P<trigger>.*" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["field_errors"]["pattern"].is_array());

    let (status, _) = json_request(
        &t.app,
        "POST",
        "/api/sources",
        Some(json!({ "url": "  " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) =
        json_request(&t.app, "POST", "/api/sources", Some(json!({ "url": URL }))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) =
        json_request(&t.app, "POST", "/api/sources", Some(json!({ "url": URL }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], 409);
}

#[tokio::test]
async fn test_remove_while_refreshing_is_locked() {
    let t = create_test_app();
    t.fetcher.set_document(URL, "ping => pong");
    let gate = t.fetcher.hold(URL);

    let (status, _) =
        json_request(&t.app, "POST", "/api/sources", Some(json!({ "url": URL }))).await;
    assert_eq!(status, StatusCode::OK);

    let uri = format!("/api/sources?url={}", URL);
    let (status, body) = json_request(&t.app, "DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::LOCKED);
    assert_eq!(body["error"]["code"], 423);

    gate.release();
    t.remote.wait_for_refresh(URL).await;

    let (status, _) = json_request(&t.app, "DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = json_request(&t.app, "DELETE", "/api/sources", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_reload_source() {
    let t = create_test_app();
    t.fetcher.set_document(URL, "ping => pong");

    let (status, _) = json_request(
        &t.app,
        "POST",
        "/api/sources/reload",
        Some(json!({ "url": URL })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    json_request(&t.app, "POST", "/api/sources", Some(json!({ "url": URL }))).await;
    t.remote.wait_for_refresh(URL).await;

    t.fetcher.set_document(URL, "ping => pong v2");
    let (status, body) = json_request(
        &t.app,
        "POST",
        "/api/sources/reload",
        Some(json!({ "url": URL })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["url"], URL);
    assert_eq!(body["data"]["started"], true);

    t.remote.wait_for_refresh(URL).await;
    assert_eq!(t.fetcher.fetch_count(URL), 2);

    let (_, body) = json_request(
        &t.app,
        "POST",
        "/api/evaluate",
        Some(json!({ "text": "ping", "addressed": true })),
    )
    .await;
    assert_eq!(body["data"]["directives"][0]["text"], "pong v2");
}

#[tokio::test]
async fn test_evaluate() {
    let t = create_test_app();
    t.fetcher.set_document(
        URL,
        "<g> ping => pong\nhello => hi\n<ag> dance => /me dances",
    );
    json_request(&t.app, "POST", "/api/sources", Some(json!({ "url": URL }))).await;
    t.remote.wait_for_refresh(URL).await;

    let (status, body) = json_request(
        &t.app,
        "POST",
        "/api/evaluate",
        Some(json!({ "text": "ping" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["matched"], true);
    let directive = &body["data"]["directives"][0];
    assert_eq!(directive["kind"], "message");
    assert_eq!(directive["text"], "pong");
    assert!(directive.get("rendered").is_none());

    // Addressed-only rule ignores unaddressed messages
    let (_, body) = json_request(
        &t.app,
        "POST",
        "/api/evaluate",
        Some(json!({ "text": "hello" })),
    )
    .await;
    assert_eq!(body["data"]["matched"], false);

    let (_, body) = json_request(
        &t.app,
        "POST",
        "/api/evaluate",
        Some(json!({ "text": "hello", "addressed": true, "sender": "alice" })),
    )
    .await;
    assert_eq!(body["data"]["directives"][0]["rendered"], "alice: hi");

    let (_, body) = json_request(
        &t.app,
        "POST",
        "/api/evaluate",
        Some(json!({ "text": "dance", "sender": "alice" })),
    )
    .await;
    let directive = &body["data"]["directives"][0];
    assert_eq!(directive["kind"], "action");
    assert_eq!(directive["rendered"], "dances");
}

#[tokio::test]
async fn test_scheduler_status() {
    let t = create_test_app();
    t.fetcher.set_document(URL, "ping => pong");
    json_request(&t.app, "POST", "/api/sources", Some(json!({ "url": URL }))).await;
    t.remote.wait_for_refresh(URL).await;

    let (status, body) = json_request(&t.app, "GET", "/api/scheduler/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["running"], false);
    assert_eq!(body["data"]["total_sources"], 1);
    assert_eq!(body["data"]["cached_sources"], 1);
    assert_eq!(body["data"]["tick_interval_secs"], 30);
}

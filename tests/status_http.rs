// tests/status_http.rs
//
// Status router exercised directly via tower::ServiceExt::oneshot.

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
};
use content_bot::metrics::{status_router, BotStatus};
use serde_json::Value;
use tokio::sync::RwLock;
use tower::ServiceExt as _; // for `oneshot`

const BODY_LIMIT: usize = 1024 * 1024;

async fn get(router: axum::Router, uri: &str) -> (StatusCode, String) {
    let req = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("build request");
    let resp = router.oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    (status, String::from_utf8(bytes.to_vec()).expect("utf8"))
}

#[tokio::test]
async fn health_returns_ok() {
    let router = status_router(None, Arc::new(RwLock::new(BotStatus::default())));
    let (status, body) = get(router, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.trim(), "OK");
}

#[tokio::test]
async fn status_reflects_shared_state() {
    let shared = Arc::new(RwLock::new(BotStatus::default()));
    {
        let mut s = shared.write().await;
        s.cycles = 4;
        s.posts = 3;
        s.last_kind = Some("news".into());
        s.last_outcome = Some("posted".into());
    }
    let (status, body) = get(status_router(None, shared), "/status").await;
    assert_eq!(status, StatusCode::OK);

    let v: Value = serde_json::from_str(&body).expect("json");
    assert_eq!(v["cycles"], 4);
    assert_eq!(v["posts"], 3);
    assert_eq!(v["last_kind"], "news");
    assert!(v["next_post_at"].is_null());
}

#[tokio::test]
async fn metrics_without_recorder_is_empty() {
    let router = status_router(None, Arc::new(RwLock::new(BotStatus::default())));
    let (status, body) = get(router, "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.is_empty());
}

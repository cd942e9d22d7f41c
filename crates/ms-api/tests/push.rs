use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use ms_api::push_router;
use ms_freshness::{ExpiryPolicy, FreshnessRegistry, SystemClock};
use tower::ServiceExt;

fn registry() -> FreshnessRegistry {
    FreshnessRegistry::new(
        Arc::new(SystemClock),
        Duration::from_secs(300),
        ExpiryPolicy::Independent,
    )
}

async fn post(app: Router, uri: &str, body: &str) -> (StatusCode, Vec<u8>) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

#[tokio::test]
async fn each_push_moves_its_stamp() {
    let reg = registry();
    let body = r#"{"time":"2024-01-01T00:00:00Z"}"#;
    let expected = 1_704_067_200_000;

    let (status, ack) = post(push_router(reg.clone()), "/push/phrase", body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack, b"{}");
    assert_eq!(reg.phrase_stamp(), expected);

    post(push_router(reg.clone()), "/push/mutelinks", body).await;
    assert_eq!(reg.mutelinks_stamp(), expected);

    post(push_router(reg.clone()), "/push/aegis", body).await;
    assert_eq!(reg.nuke_stamp(), expected);
}

#[tokio::test]
async fn phrase_removal_counts_towards_phrase_stamp() {
    let reg = registry();
    post(
        push_router(reg.clone()),
        "/push/phrase-removal",
        r#"{"time":"2024-01-01T00:00:01Z"}"#,
    )
    .await;
    assert_eq!(reg.phrase_stamp(), 1_704_067_201_000);
}

#[tokio::test(start_paused = true)]
async fn nuke_push_sets_stamp_immediately() {
    let reg = registry();
    let (status, _) = post(
        push_router(reg.clone()),
        "/push/nuke",
        r#"{"time":"2024-01-01T00:00:00Z"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reg.nuke_stamp(), 1_704_067_200_000);
}

#[tokio::test]
async fn malformed_body_is_rejected() {
    let reg = registry();
    reg.phrase_added(chrono::DateTime::from_timestamp(5, 0).unwrap());

    let (status, _) = post(push_router(reg.clone()), "/push/phrase", r#"{"time":"soon"}"#).await;
    assert!(status.is_client_error());

    let (status, _) = post(push_router(reg.clone()), "/push/phrase", "not json").await;
    assert!(status.is_client_error());

    assert_eq!(reg.phrase_stamp(), 5_000);
}

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::{DateTime, TimeZone, Utc};
use ms_api::{router, AppState};
use ms_core::{
    EmbedStat, LogLine, MockCatalogRepo, MockLogStore, MockSettingsCache, Phrase, UserFeatures,
};
use ms_freshness::{ExpiryPolicy, FreshnessRegistry, SystemClock};
use serde_json::{json, Value};
use tower::ServiceExt;

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

fn line(secs: i64, username: &str, features: &str, message: &str) -> LogLine {
    LogLine {
        time: at(secs),
        username: username.into(),
        features: features.into(),
        message: message.into(),
    }
}

fn registry() -> FreshnessRegistry {
    FreshnessRegistry::new(
        Arc::new(SystemClock),
        Duration::from_secs(300),
        ExpiryPolicy::Independent,
    )
}

struct Harness {
    store: MockLogStore,
    catalog: MockCatalogRepo,
    settings: MockSettingsCache,
    freshness: FreshnessRegistry,
}

impl Harness {
    fn new() -> Self {
        Self {
            store: MockLogStore::new(),
            catalog: MockCatalogRepo::new(),
            settings: MockSettingsCache::new(),
            freshness: registry(),
        }
    }

    fn app(self, prefix: &str) -> Router {
        router(
            AppState {
                store: Arc::new(self.store),
                catalog: Arc::new(self.catalog),
                settings: Arc::new(self.settings),
                freshness: self.freshness,
            },
            prefix,
        )
    }
}

async fn get(app: Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
    let (status, body) = get(app, uri).await;
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn nukes_are_reconstructed_from_the_store() {
    let mut h = Harness::new();
    h.store.expect_recent_nuke_commands().returning(|_, _| {
        Ok(vec![
            line(20, "Mod", "moderator", "!meganuke 30m /spam+/"),
            line(10, "Mod", "moderator", "!nuke ads"),
        ])
    });
    h.store
        .expect_recent_nuke_confirmations()
        .returning(|_, _| Ok(vec![line(20, "Bot", "bot", "Dropping the NUKE on 12 victims")]));

    let (status, body) = get_json(h.app(""), "/nukes").await;

    assert_eq!(status, StatusCode::OK);
    let nukes = body.as_array().unwrap();
    assert_eq!(nukes.len(), 2);
    assert_eq!(nukes[0]["type"], "meganuke");
    assert_eq!(nukes[0]["word"], "/spam+/");
    assert_eq!(nukes[0]["duration"], "30m");
    assert_eq!(nukes[0]["victims"], "12");
    assert_eq!(nukes[1]["word"], "ads");
    assert_eq!(nukes[1]["victims"], "");
}

#[tokio::test]
async fn ts_wraps_payload_with_stamp() {
    let mut h = Harness::new();
    h.store
        .expect_recent_nuke_commands()
        .returning(|_, _| Ok(vec![]));
    h.store
        .expect_recent_nuke_confirmations()
        .returning(|_, _| Ok(vec![]));
    h.freshness.aegis_pushed(at(0));

    let (status, body) = get_json(h.app(""), "/nukes?ts=1").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "updatedAt": 1_700_000_000_000i64, "data": [] }));
}

#[tokio::test]
async fn store_failure_is_a_500() {
    let mut h = Harness::new();
    h.store
        .expect_recent_nuke_commands()
        .returning(|_, _| Err(anyhow::anyhow!("connection refused")));

    let (status, _) = get(h.app(""), "/nukes").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn mutelinks_state_and_missing_data() {
    let mut h = Harness::new();
    h.store
        .expect_latest_mutelinks_command()
        .returning(|| Ok(Some(line(5, "Mod", "moderator", "!mutelinks all 1h"))));

    let (status, body) = get_json(h.app(""), "/mutelinks").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["status"], "all");
    assert_eq!(body[0]["duration"], "1h");
    assert_eq!(body[0]["user"], "Mod");

    let mut h = Harness::new();
    h.store
        .expect_latest_mutelinks_command()
        .returning(|| Ok(None));
    let (status, body) = get(h.app(""), "/mutelinks").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, b"Don't have data for mutelinks");
}

#[tokio::test]
async fn phrases_count_is_validated() {
    let mut h = Harness::new();
    h.store
        .expect_phrases()
        .withf(|limit| *limit == Some(2))
        .returning(|_| {
            Ok(vec![Phrase {
                time: at(1),
                username: "Bot".into(),
                phrase: "bad words".into(),
                duration: "1d".into(),
                kind: "ban".into(),
            }])
        });
    h.freshness.phrase_removed(at(3));
    h.freshness.phrase_added(at(2));

    let (status, body) = get_json(h.app(""), "/phrases?count=2&ts=1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["updatedAt"], 1_700_000_003_000i64);
    assert_eq!(body["data"][0]["phrase"], "bad words");
    assert_eq!(body["data"][0]["type"], "ban");

    let (status, _) = get(Harness::new().app(""), "/phrases?count=lots").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn timestamps_snapshot() {
    let h = Harness::new();
    h.freshness.phrase_added(at(1));
    h.freshness.aegis_pushed(at(2));
    h.freshness.mutelinks_changed(at(3));

    let (_, body) = get_json(h.app(""), "/nmptimestamps").await;
    assert_eq!(
        body,
        json!({
            "phrases": 1_700_000_001_000i64,
            "nukes": 1_700_000_002_000i64,
            "mutelinks": 1_700_000_003_000i64,
        })
    );
}

#[tokio::test]
async fn logs_are_grouped_by_second() {
    let mut h = Harness::new();
    h.store.expect_lines_between().returning(|_, _| {
        Ok(vec![
            line(0, "a", "", "one"),
            line(0, "b", "subscriber", "two"),
            line(1, "a", "", "three"),
        ])
    });

    let (status, body) = get_json(
        h.app(""),
        "/logs?from=2023-11-14T22:00:00Z&to=2023-11-14T23:00:00Z",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["1700000000"].as_array().unwrap().len(), 2);
    assert_eq!(body["1700000001"][0]["message"], "three");
}

#[tokio::test]
async fn logs_without_both_bounds_are_empty() {
    let (status, body) = get_json(Harness::new().app(""), "/rawlogs?from=2023-11-14T22:00:00Z").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn msgcount_passes_username_pattern() {
    let mut h = Harness::new();
    h.store
        .expect_message_count_today()
        .withf(|u| u == "destiny")
        .returning(|_| Ok(42));

    let (_, body) = get_json(h.app(""), "/msgcount?u=destiny").await;
    assert_eq!(body, json!({ "count": 42 }));
}

#[tokio::test]
async fn features_map_username_to_flags() {
    let mut h = Harness::new();
    h.catalog.expect_user_features().returning(|| {
        Ok(vec![UserFeatures {
            username: "Mod".into(),
            features: "moderator".into(),
        }])
    });

    let (_, body) = get_json(h.app(""), "/features").await;
    assert_eq!(body, json!({ "Mod": "moderator" }));
}

#[tokio::test]
async fn embeds_window_in_minutes() {
    let mut h = Harness::new();
    h.catalog
        .expect_top_embeds()
        .withf(|window, limit| *window == 600 && *limit == 5)
        .returning(|_, _| {
            Ok(vec![EmbedStat {
                link: "#youtube/abc".into(),
                platform: "youtube".into(),
                channel: "abc".into(),
                title: "video".into(),
                count: 3,
            }])
        });

    let (status, body) = get_json(h.app(""), "/embeds?t=10").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["count"], 3);

    let (status, body) = get(Harness::new().app(""), "/embeds?t=90").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, b"Time needs to be between 5 and 60 minutes");
}

#[tokio::test]
async fn lastlwod_redirects_to_sheet() {
    let mut h = Harness::new();
    h.catalog
        .expect_latest_lwod_sheet()
        .returning(|| Ok(Some("sheet123".into())));

    let response = h
        .app("")
        .oneshot(Request::builder().uri("/lastlwod").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        response.headers()[header::LOCATION],
        "https://docs.google.com/spreadsheets/d/sheet123"
    );
}

fn setting(key: &str) -> Option<String> {
    match key {
        "SCRIPT_VERSION" => Some("1.2.3".into()),
        "SCRIPT_LINK" => Some("https://example.com/script.user.js".into()),
        _ => None,
    }
}

#[tokio::test]
async fn script_reads_settings_cache() {
    let mut h = Harness::new();
    h.settings.expect_get().returning(|key| Ok(setting(key)));

    let (status, body) = get_json(h.app(""), "/script").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "version": "1.2.3", "link": "https://example.com/script.user.js" })
    );
}

#[tokio::test]
async fn unset_setting_is_a_404() {
    let mut h = Harness::new();
    h.settings.expect_get().returning(|key| Ok(setting(key)));

    let (status, body) = get(h.app(""), "/script/dev").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, b"DEV_SCRIPT_VERSION is not set");
}

#[tokio::test]
async fn routes_live_under_prefix() {
    let (status, _) = get(Harness::new().app("/api"), "/api/health").await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = get(Harness::new().app("/api"), "/health").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

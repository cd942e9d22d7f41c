//! # Push ingress
//!
//! Internal endpoints the enforcement bot calls when it changes state.
//! Each carries only the time of the change; the registry applies it.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use ms_freshness::FreshnessRegistry;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::middleware::standard_middleware;

#[derive(Debug, Deserialize)]
pub struct PushEvent {
    pub time: DateTime<Utc>,
}

fn ack() -> Json<Value> {
    Json(json!({}))
}

async fn phrase(State(registry): State<FreshnessRegistry>, Json(event): Json<PushEvent>) -> Json<Value> {
    registry.phrase_added(event.time);
    ack()
}

async fn phrase_removal(
    State(registry): State<FreshnessRegistry>,
    Json(event): Json<PushEvent>,
) -> Json<Value> {
    registry.phrase_removed(event.time);
    ack()
}

async fn nuke(State(registry): State<FreshnessRegistry>, Json(event): Json<PushEvent>) -> Json<Value> {
    // the expiry timer runs detached
    let _expiry = registry.nuke_pushed(event.time);
    debug!(time = %event.time, "nuke expiry armed");
    ack()
}

async fn aegis(State(registry): State<FreshnessRegistry>, Json(event): Json<PushEvent>) -> Json<Value> {
    registry.aegis_pushed(event.time);
    ack()
}

async fn mutelinks(
    State(registry): State<FreshnessRegistry>,
    Json(event): Json<PushEvent>,
) -> Json<Value> {
    registry.mutelinks_changed(event.time);
    ack()
}

/// Routes for the push listener. Malformed bodies are rejected by the JSON
/// extractor before the registry is touched.
pub fn push_router(registry: FreshnessRegistry) -> Router {
    Router::new()
        .route("/push/phrase", post(phrase))
        .route("/push/phrase-removal", post(phrase_removal))
        .route("/push/nuke", post(nuke))
        .route("/push/aegis", post(aegis))
        .route("/push/mutelinks", post(mutelinks))
        .with_state(registry)
        .layer(standard_middleware())
}

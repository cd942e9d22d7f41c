//! # ms-api
//!
//! The web routing layer: the public read API and the internal push
//! ingress, each served on its own listener.

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod push;

use axum::routing::get;
use axum::Router;

pub use handlers::AppState;
pub use push::push_router;

/// Configures the public routes under `prefix` (e.g. `/api`, or empty).
pub fn router(state: AppState, prefix: &str) -> Router {
    let routes = Router::new()
        .route("/nukes", get(handlers::nukes))
        .route("/mutelinks", get(handlers::mutelinks))
        .route("/phrases", get(handlers::phrases))
        .route("/nmptimestamps", get(handlers::timestamps))
        .route("/logs", get(handlers::logs))
        .route("/rawlogs", get(handlers::raw_logs))
        .route("/msgcount", get(handlers::msg_count))
        .route("/features", get(handlers::features))
        .route("/ytvods", get(handlers::youtube_vods))
        .route("/rumblevods", get(handlers::rumble_vods))
        .route("/omnimirror", get(handlers::omnimirror_vods))
        .route("/embeds", get(handlers::top_embeds))
        .route("/embeds/last", get(handlers::last_embeds))
        .route("/lwod", get(handlers::lwod))
        .route("/lastlwod", get(handlers::last_lwod))
        .route("/script", get(handlers::script))
        .route("/script/dev", get(handlers::dev_script))
        .route("/providers", get(handlers::providers))
        .route("/health", get(handlers::health))
        .with_state(state);

    // axum refuses to nest at the root
    let routes = if prefix.is_empty() {
        routes
    } else {
        Router::new().nest(prefix, routes)
    };

    routes
        .layer(middleware::cors_policy())
        .layer(middleware::standard_middleware())
}

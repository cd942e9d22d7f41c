//! # ms-api Handlers
//!
//! Read endpoints. Moderation state is reconstructed from the log store on
//! every request; the freshness stamps only tell clients when to ask.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use ms_core::reconstruct::{load_active_nukes, load_mutelinks_state};
use ms_core::traits::{CatalogRepo, LogStore, SettingsCache};
use ms_core::{AppError, LogLine};
use ms_freshness::FreshnessRegistry;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Newest entries returned by the VOD listings.
pub const VOD_LIMIT: i64 = 45;
pub const EMBED_LIMIT: i64 = 5;
pub const EMBED_WINDOW_MINUTES: std::ops::RangeInclusive<i64> = 5..=60;

const SHEET_URL: &str = "https://docs.google.com/spreadsheets/d/";

/// State shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn LogStore>,
    pub catalog: Arc<dyn CatalogRepo>,
    pub settings: Arc<dyn SettingsCache>,
    pub freshness: FreshnessRegistry,
}

type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Stamped<T> {
    updated_at: i64,
    data: T,
}

/// `ts=1` wraps the payload with the stamp it was current as of.
fn stamped<T: Serialize>(ts: Option<&str>, updated_at: i64, data: T) -> Response {
    if ts == Some("1") {
        Json(Stamped { updated_at, data }).into_response()
    } else {
        Json(data).into_response()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct TsQuery {
    ts: Option<String>,
}

// ── Moderation state ────────────────────────────────────────────────────────

pub async fn nukes(State(state): State<AppState>, Query(q): Query<TsQuery>) -> ApiResult<Response> {
    let nukes = load_active_nukes(state.store.as_ref(), Utc::now()).await?;
    Ok(stamped(q.ts.as_deref(), state.freshness.nuke_stamp(), nukes))
}

pub async fn mutelinks(
    State(state): State<AppState>,
    Query(q): Query<TsQuery>,
) -> ApiResult<Response> {
    let current = load_mutelinks_state(state.store.as_ref())
        .await?
        .ok_or_else(|| AppError::NotFound("Don't have data for mutelinks".into()))?;
    Ok(stamped(
        q.ts.as_deref(),
        state.freshness.mutelinks_stamp(),
        [current],
    ))
}

#[derive(Debug, Deserialize)]
pub struct PhrasesQuery {
    count: Option<String>,
    ts: Option<String>,
}

pub async fn phrases(
    State(state): State<AppState>,
    Query(q): Query<PhrasesQuery>,
) -> ApiResult<Response> {
    let limit = match q.count.as_deref().filter(|c| !c.is_empty()) {
        None => None,
        Some(raw) => match raw.parse::<i64>() {
            Ok(n) if n >= 0 => Some(n),
            _ => {
                return Err(
                    AppError::ValidationError("The count parameter is invalid".into()).into(),
                )
            }
        },
    };
    let phrases = state.store.phrases(limit).await?;
    Ok(stamped(q.ts.as_deref(), state.freshness.phrase_stamp(), phrases))
}

pub async fn timestamps(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.freshness.snapshot())
}

// ── Raw log access ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    from: Option<String>,
    to: Option<String>,
}

impl RangeQuery {
    /// `None` when either bound is missing; the endpoints answer empty then.
    fn bounds(&self) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>, AppError> {
        let (Some(from), Some(to)) = (
            self.from.as_deref().filter(|s| !s.is_empty()),
            self.to.as_deref().filter(|s| !s.is_empty()),
        ) else {
            return Ok(None);
        };
        Ok(Some((parse_bound("from", from)?, parse_bound("to", to)?)))
    }
}

/// RFC 3339, or a zone-less date / date-time taken as UTC.
fn parse_bound(name: &str, raw: &str) -> Result<DateTime<Utc>, AppError> {
    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Ok(t.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(t) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(t.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(|d| d.and_time(NaiveTime::MIN).and_utc())
        .map_err(|_| AppError::ValidationError(format!("The {name} parameter is invalid")))
}

#[derive(Debug, Serialize)]
pub struct GroupedLine {
    username: String,
    features: String,
    message: String,
}

#[derive(Debug, Serialize)]
pub struct RawLine {
    time: String,
    username: String,
    features: String,
    message: String,
}

/// Lines in `[from, to)` keyed by the epoch second they were posted in.
pub async fn logs(
    State(state): State<AppState>,
    Query(q): Query<RangeQuery>,
) -> ApiResult<Json<BTreeMap<i64, Vec<GroupedLine>>>> {
    let mut grouped: BTreeMap<i64, Vec<GroupedLine>> = BTreeMap::new();
    if let Some((from, to)) = q.bounds()? {
        for line in state.store.lines_between(from, to).await? {
            grouped
                .entry(line.time.timestamp())
                .or_default()
                .push(GroupedLine {
                    username: line.username,
                    features: line.features,
                    message: line.message,
                });
        }
    }
    Ok(Json(grouped))
}

pub async fn raw_logs(
    State(state): State<AppState>,
    Query(q): Query<RangeQuery>,
) -> ApiResult<Json<Vec<RawLine>>> {
    let Some((from, to)) = q.bounds()? else {
        return Ok(Json(Vec::new()));
    };
    let lines = state.store.lines_between(from, to).await?;
    Ok(Json(lines.into_iter().map(raw_line).collect()))
}

fn raw_line(line: LogLine) -> RawLine {
    RawLine {
        time: line.time.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
        username: line.username,
        features: line.features,
        message: line.message,
    }
}

#[derive(Debug, Deserialize)]
pub struct MsgCountQuery {
    #[serde(default)]
    u: String,
}

#[derive(Debug, Serialize)]
pub struct MsgCount {
    count: i64,
}

pub async fn msg_count(
    State(state): State<AppState>,
    Query(q): Query<MsgCountQuery>,
) -> ApiResult<Json<MsgCount>> {
    let count = state.store.message_count_today(&q.u).await?;
    Ok(Json(MsgCount { count }))
}

// ── Catalogs ────────────────────────────────────────────────────────────────

pub async fn features(State(state): State<AppState>) -> ApiResult<Json<BTreeMap<String, String>>> {
    let features = state.catalog.user_features().await?;
    Ok(Json(
        features
            .into_iter()
            .map(|f| (f.username, f.features))
            .collect(),
    ))
}

pub async fn youtube_vods(State(state): State<AppState>) -> ApiResult<Response> {
    Ok(Json(state.catalog.youtube_vods(VOD_LIMIT).await?).into_response())
}

pub async fn rumble_vods(State(state): State<AppState>) -> ApiResult<Response> {
    Ok(Json(state.catalog.rumble_vods(VOD_LIMIT).await?).into_response())
}

pub async fn omnimirror_vods(State(state): State<AppState>) -> ApiResult<Response> {
    Ok(Json(state.catalog.omnimirror_vods(VOD_LIMIT).await?).into_response())
}

#[derive(Debug, Deserialize)]
pub struct EmbedsQuery {
    t: Option<String>,
}

pub async fn top_embeds(
    State(state): State<AppState>,
    Query(q): Query<EmbedsQuery>,
) -> ApiResult<Response> {
    let minutes = embed_window(q.t.as_deref())?;
    let embeds = state.catalog.top_embeds(minutes * 60, EMBED_LIMIT).await?;
    Ok(Json(embeds).into_response())
}

fn embed_window(raw: Option<&str>) -> Result<i64, AppError> {
    let raw = raw
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::ValidationError("The time parameter has not been provided".into()))?;
    let minutes: i64 = raw
        .parse()
        .map_err(|_| AppError::ValidationError("The time parameter is invalid".into()))?;
    if !EMBED_WINDOW_MINUTES.contains(&minutes) {
        return Err(AppError::ValidationError(
            "Time needs to be between 5 and 60 minutes".into(),
        ));
    }
    Ok(minutes)
}

pub async fn last_embeds(State(state): State<AppState>) -> ApiResult<Response> {
    Ok(Json(state.catalog.last_embeds(EMBED_LIMIT).await?).into_response())
}

#[derive(Debug, Deserialize)]
pub struct LwodQuery {
    id: Option<String>,
    v: Option<String>,
}

/// `?id=` looks up a Twitch VOD, `?v=` a YouTube video, neither lists all.
pub async fn lwod(State(state): State<AppState>, Query(q): Query<LwodQuery>) -> ApiResult<Response> {
    let id = q.id.filter(|s| !s.is_empty());
    let v = q.v.filter(|s| !s.is_empty());
    let response = match (id, v) {
        (Some(id), _) => Json(state.catalog.lwod_by_twitch(&id).await?).into_response(),
        (None, Some(v)) => Json(state.catalog.lwod_by_youtube(&v).await?).into_response(),
        (None, None) => Json(state.catalog.lwod_all().await?).into_response(),
    };
    Ok(response)
}

pub async fn last_lwod(State(state): State<AppState>) -> ApiResult<Response> {
    let sheet = state
        .catalog
        .latest_lwod_sheet()
        .await?
        .ok_or_else(|| AppError::NotFound("No LWOD sheet on record".into()))?;
    Ok((
        StatusCode::FOUND,
        [(header::LOCATION, format!("{SHEET_URL}{sheet}"))],
    )
        .into_response())
}

// ── Userscript settings ─────────────────────────────────────────────────────

async fn setting(cache: &dyn SettingsCache, key: &str) -> Result<String, ApiError> {
    cache
        .get(key)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{key} is not set")).into())
}

#[derive(Debug, Serialize)]
pub struct ScriptInfo {
    version: String,
    link: String,
}

pub async fn script(State(state): State<AppState>) -> ApiResult<Json<ScriptInfo>> {
    Ok(Json(ScriptInfo {
        version: setting(state.settings.as_ref(), "SCRIPT_VERSION").await?,
        link: setting(state.settings.as_ref(), "SCRIPT_LINK").await?,
    }))
}

pub async fn dev_script(State(state): State<AppState>) -> ApiResult<Json<ScriptInfo>> {
    Ok(Json(ScriptInfo {
        version: setting(state.settings.as_ref(), "DEV_SCRIPT_VERSION").await?,
        link: setting(state.settings.as_ref(), "DEV_SCRIPT_LINK").await?,
    }))
}

#[derive(Debug, Serialize)]
pub struct Providers {
    embeds: String,
    phrases: String,
    nukes: String,
    links: String,
}

pub async fn providers(State(state): State<AppState>) -> ApiResult<Json<Providers>> {
    let cache = state.settings.as_ref();
    Ok(Json(Providers {
        embeds: setting(cache, "SCRIPT_EMBEDS_PROVIDER").await?,
        phrases: setting(cache, "SCRIPT_PHRASES_PROVIDER").await?,
        nukes: setting(cache, "SCRIPT_NUKES_PROVIDER").await?,
        links: setting(cache, "SCRIPT_LINKS_PROVIDER").await?,
    }))
}

pub async fn health() -> &'static str {
    "OK"
}

//! # Domain Models
//!
//! These structs represent the rows read from the chat log store and the
//! transient moderation state reconstructed from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

/// One immutable row of the chat log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    pub time: DateTime<Utc>,
    pub username: String,
    /// Role tags as stored by the logger (e.g. "moderator,subscriber")
    pub features: String,
    pub message: String,
}

/// Which nuke command created a filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NukeKind {
    Nuke,
    MegaNuke,
}

/// A content filter that is still in force.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveNuke {
    pub time: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: NukeKind,
    pub duration: String,
    /// Normalized pattern: `/inner/` for regex patterns, the literal otherwise
    #[serde(rename = "word")]
    pub pattern: String,
    #[serde(serialize_with = "empty_if_none")]
    pub victims: Option<String>,
}

fn empty_if_none<S: Serializer>(value: &Option<String>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(value.as_deref().unwrap_or(""))
}

/// Link-muting policy as set by the latest mutelinks command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkMuteStatus {
    On,
    Off,
    All,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MuteLinkState {
    pub time: DateTime<Utc>,
    pub status: LinkMuteStatus,
    pub duration: String,
    pub user: String,
}

/// A banned phrase as recorded by the enforcement bot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phrase {
    pub time: DateTime<Utc>,
    pub username: String,
    pub phrase: String,
    pub duration: String,
    #[serde(rename = "type")]
    pub kind: String,
}

// ── Catalog rows ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserFeatures {
    pub username: String,
    pub features: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct YoutubeVod {
    pub id: String,
    pub title: String,
    #[serde(rename = "starttime")]
    pub start: String,
    #[serde(rename = "endtime")]
    pub end: String,
    pub thumbnail: String,
}

/// Rumble and omnimirror share one schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MirrorVod {
    pub public_id: String,
    pub embed_id: String,
    pub title: String,
    pub link: String,
    pub thumbnail: String,
    #[serde(rename = "starttime")]
    pub start: String,
    #[serde(rename = "endtime")]
    pub end: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbedStat {
    pub link: String,
    pub platform: String,
    pub channel: String,
    pub title: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LastEmbed {
    pub link: String,
    pub platform: String,
    pub channel: String,
    pub title: String,
    pub timestamp: i64,
}

/// LWOD entry for a Twitch VOD id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LwodTwitchEntry {
    #[serde(rename = "starttime")]
    pub start: String,
    #[serde(rename = "endtime")]
    pub end: String,
    pub game: String,
    pub subject: String,
    pub topic: String,
}

/// LWOD entry for a YouTube video id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LwodYoutubeEntry {
    pub time: i64,
    pub game: String,
    pub subject: String,
    pub topic: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LwodEntry {
    pub twitch: Option<String>,
    pub youtube: Option<String>,
    #[serde(rename = "starttime")]
    pub start: String,
    #[serde(rename = "endtime")]
    pub end: String,
    pub game: String,
    pub subject: String,
    pub topic: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_nuke_serializes_missing_victims_as_empty() {
        let nuke = ActiveNuke {
            time: Utc::now(),
            kind: NukeKind::MegaNuke,
            duration: "10m".into(),
            pattern: "/spam/".into(),
            victims: None,
        };
        let json = serde_json::to_value(&nuke).unwrap();
        assert_eq!(json["type"], "meganuke");
        assert_eq!(json["word"], "/spam/");
        assert_eq!(json["victims"], "");
    }
}

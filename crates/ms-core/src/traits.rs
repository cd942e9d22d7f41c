//! # Core Traits (Ports)
//!
//! Any plugin must implement these traits to be used by the binary.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{
    EmbedStat, LastEmbed, LogLine, LwodEntry, LwodTwitchEntry, LwodYoutubeEntry, MirrorVod,
    Phrase, UserFeatures, YoutubeVod,
};

/// Read contract over the chat log store. All queries are read-only and
/// bounded; rows come back newest first unless stated otherwise.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait LogStore: Send + Sync {
    // Reconstruction inputs
    /// Moderator/admin nuke-family commands issued at or after `since`.
    async fn recent_nuke_commands(
        &self,
        since: DateTime<Utc>,
        limit: i64,
    ) -> anyhow::Result<Vec<LogLine>>;
    /// Bot confirmations of executed nukes issued at or after `since`.
    async fn recent_nuke_confirmations(
        &self,
        since: DateTime<Utc>,
        limit: i64,
    ) -> anyhow::Result<Vec<LogLine>>;
    /// The single most recent moderator/admin mutelinks command.
    async fn latest_mutelinks_command(&self) -> anyhow::Result<Option<LogLine>>;

    // Reconciliation truths
    async fn latest_phrase_time(&self) -> anyhow::Result<Option<DateTime<Utc>>>;
    /// Latest nuke-table row not written by the bot itself.
    async fn latest_nuke_time(&self) -> anyhow::Result<Option<DateTime<Utc>>>;
    async fn latest_mutelinks_time(&self) -> anyhow::Result<Option<DateTime<Utc>>>;

    // Plain reads
    async fn phrases(&self, limit: Option<i64>) -> anyhow::Result<Vec<Phrase>>;
    /// Lines in `[from, to)`, oldest first.
    async fn lines_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> anyhow::Result<Vec<LogLine>>;
    /// Messages posted today by authors matching `username_pattern`.
    async fn message_count_today(&self, username_pattern: &str) -> anyhow::Result<i64>;
}

/// Read-only catalogs (VOD indexes, feature flags, embed statistics).
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait CatalogRepo: Send + Sync {
    async fn user_features(&self) -> anyhow::Result<Vec<UserFeatures>>;
    async fn youtube_vods(&self, limit: i64) -> anyhow::Result<Vec<YoutubeVod>>;
    async fn rumble_vods(&self, limit: i64) -> anyhow::Result<Vec<MirrorVod>>;
    async fn omnimirror_vods(&self, limit: i64) -> anyhow::Result<Vec<MirrorVod>>;
    /// Most embedded links within the last `window_secs` seconds.
    async fn top_embeds(&self, window_secs: i64, limit: i64) -> anyhow::Result<Vec<EmbedStat>>;
    async fn last_embeds(&self, limit: i64) -> anyhow::Result<Vec<LastEmbed>>;
    async fn lwod_by_twitch(&self, vod_id: &str) -> anyhow::Result<Vec<LwodTwitchEntry>>;
    async fn lwod_by_youtube(&self, video_id: &str) -> anyhow::Result<Vec<LwodYoutubeEntry>>;
    async fn lwod_all(&self) -> anyhow::Result<Vec<LwodEntry>>;
    async fn latest_lwod_sheet(&self) -> anyhow::Result<Option<String>>;
}

/// Flat key/value settings cache.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait SettingsCache: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
}

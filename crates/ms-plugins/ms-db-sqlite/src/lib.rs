//! # ms-db-sqlite Implementation
//!
//! This module implements the data mapping between the SQLite catalog files
//! (feature flags, VOD indexes, LWOD sheets, embed statistics) and the
//! `ms-core` catalog models. Every catalog lives in its own file under one
//! directory and is opened read-only.

use std::path::Path;

use async_trait::async_trait;
use ms_core::models::{
    EmbedStat, LastEmbed, LwodEntry, LwodTwitchEntry, LwodYoutubeEntry, MirrorVod, UserFeatures,
    YoutubeVod,
};
use ms_core::traits::CatalogRepo;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;

pub struct SqliteCatalog {
    features: SqlitePool,
    lwod: SqlitePool,
    ytvods: SqlitePool,
    rumble: SqlitePool,
    omnimirror: SqlitePool,
    embeds: SqlitePool,
}

fn lazy_pool(dir: &Path, file: &str) -> SqlitePool {
    let options = SqliteConnectOptions::new()
        .filename(dir.join(file))
        .read_only(true);
    SqlitePoolOptions::new()
        .max_connections(4)
        .connect_lazy_with(options)
}

impl SqliteCatalog {
    /// Opens the catalog files under `dir`. Connections are established on
    /// first use, so a missing file only fails the endpoints that need it.
    pub fn open(dir: &Path) -> Self {
        tracing::info!(dir = %dir.display(), "opening SQLite catalogs");
        Self {
            features: lazy_pool(dir, "featdb.db"),
            lwod: lazy_pool(dir, "lwoddb.db"),
            ytvods: lazy_pool(dir, "ytvoddb.db"),
            rumble: lazy_pool(dir, "rumble.sqlite"),
            omnimirror: lazy_pool(dir, "omnimirror.sqlite"),
            embeds: lazy_pool(dir, "embeddb.db"),
        }
    }

    /// Serves every catalog from one database.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self {
            features: pool.clone(),
            lwod: pool.clone(),
            ytvods: pool.clone(),
            rumble: pool.clone(),
            omnimirror: pool.clone(),
            embeds: pool,
        }
    }
}

const MIRROR_VODS: &str = "SELECT public_id, embed_id, title, link, thumbnail, start_time, end_time \
     FROM rumble ORDER BY datetime(start_time) DESC LIMIT ?";

async fn mirror_vods(pool: &SqlitePool, limit: i64) -> anyhow::Result<Vec<MirrorVod>> {
    let rows = sqlx::query(MIRROR_VODS).bind(limit).fetch_all(pool).await?;
    let vods = rows.iter().map(to_mirror_vod).collect::<Result<Vec<_>, _>>()?;
    Ok(vods)
}

fn to_mirror_vod(row: &SqliteRow) -> Result<MirrorVod, sqlx::Error> {
    Ok(MirrorVod {
        public_id: row.try_get("public_id")?,
        embed_id: row.try_get("embed_id")?,
        title: row.try_get("title")?,
        link: row.try_get("link")?,
        thumbnail: row.try_get("thumbnail")?,
        start: row.try_get("start_time")?,
        end: row.try_get("end_time")?,
    })
}

#[async_trait]
impl CatalogRepo for SqliteCatalog {
    /// `dggfeat` is a two-column table: username, features.
    async fn user_features(&self) -> anyhow::Result<Vec<UserFeatures>> {
        let rows = sqlx::query("SELECT * FROM dggfeat")
            .fetch_all(&self.features)
            .await?;
        let features = rows
            .iter()
            .map(|row| {
                Ok(UserFeatures {
                    username: row.try_get(0)?,
                    features: row.try_get(1)?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()?;
        Ok(features)
    }

    async fn youtube_vods(&self, limit: i64) -> anyhow::Result<Vec<YoutubeVod>> {
        let rows = sqlx::query(
            "SELECT vodid, title, starttime, endtime, thumbnail FROM ytvods \
             ORDER BY datetime(starttime) DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.ytvods)
        .await?;
        let vods = rows
            .iter()
            .map(|row| {
                Ok(YoutubeVod {
                    id: row.try_get("vodid")?,
                    title: row.try_get("title")?,
                    start: row.try_get("starttime")?,
                    end: row.try_get("endtime")?,
                    thumbnail: row.try_get("thumbnail")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()?;
        Ok(vods)
    }

    async fn rumble_vods(&self, limit: i64) -> anyhow::Result<Vec<MirrorVod>> {
        mirror_vods(&self.rumble, limit).await
    }

    async fn omnimirror_vods(&self, limit: i64) -> anyhow::Result<Vec<MirrorVod>> {
        mirror_vods(&self.omnimirror, limit).await
    }

    async fn top_embeds(&self, window_secs: i64, limit: i64) -> anyhow::Result<Vec<EmbedStat>> {
        let rows = sqlx::query(
            "SELECT link, platform, channel, title, count(link) AS freq FROM embeds \
             WHERE timest >= strftime('%s', 'now') - ? \
             GROUP BY link ORDER BY freq DESC LIMIT ?",
        )
        .bind(window_secs)
        .bind(limit)
        .fetch_all(&self.embeds)
        .await?;
        let embeds = rows
            .iter()
            .map(|row| {
                Ok(EmbedStat {
                    link: row.try_get("link")?,
                    platform: row.try_get("platform")?,
                    channel: row.try_get("channel")?,
                    title: row.try_get("title")?,
                    count: row.try_get("freq")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()?;
        Ok(embeds)
    }

    async fn last_embeds(&self, limit: i64) -> anyhow::Result<Vec<LastEmbed>> {
        let rows = sqlx::query(
            "SELECT timest, link, platform, channel, title FROM embeds ORDER BY timest DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.embeds)
        .await?;
        let embeds = rows
            .iter()
            .map(|row| {
                Ok(LastEmbed {
                    link: row.try_get("link")?,
                    platform: row.try_get("platform")?,
                    channel: row.try_get("channel")?,
                    title: row.try_get("title")?,
                    timestamp: row.try_get("timest")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()?;
        Ok(embeds)
    }

    async fn lwod_by_twitch(&self, vod_id: &str) -> anyhow::Result<Vec<LwodTwitchEntry>> {
        let rows = sqlx::query(
            "SELECT starttime, endtime, game, subject, topic FROM lwod WHERE vodid = ?",
        )
        .bind(vod_id)
        .fetch_all(&self.lwod)
        .await?;
        let entries = rows
            .iter()
            .map(|row| {
                Ok(LwodTwitchEntry {
                    start: row.try_get("starttime")?,
                    end: row.try_get("endtime")?,
                    game: row.try_get("game")?,
                    subject: row.try_get("subject")?,
                    topic: row.try_get("topic")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()?;
        Ok(entries)
    }

    async fn lwod_by_youtube(&self, video_id: &str) -> anyhow::Result<Vec<LwodYoutubeEntry>> {
        let rows = sqlx::query(
            "SELECT yttime, game, subject, topic FROM lwod WHERE vidid = ? ORDER BY yttime",
        )
        .bind(video_id)
        .fetch_all(&self.lwod)
        .await?;
        let entries = rows
            .iter()
            .map(|row| {
                Ok(LwodYoutubeEntry {
                    time: row.try_get("yttime")?,
                    game: row.try_get("game")?,
                    subject: row.try_get("subject")?,
                    topic: row.try_get("topic")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()?;
        Ok(entries)
    }

    async fn lwod_all(&self) -> anyhow::Result<Vec<LwodEntry>> {
        let rows = sqlx::query(
            "SELECT vodid, vidid, starttime, endtime, game, subject, topic FROM lwod",
        )
        .fetch_all(&self.lwod)
        .await?;
        let entries = rows
            .iter()
            .map(|row| {
                Ok(LwodEntry {
                    twitch: row.try_get("vodid")?,
                    youtube: row.try_get("vidid")?,
                    start: row.try_get("starttime")?,
                    end: row.try_get("endtime")?,
                    game: row.try_get("game")?,
                    subject: row.try_get("subject")?,
                    topic: row.try_get("topic")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()?;
        Ok(entries)
    }

    async fn latest_lwod_sheet(&self) -> anyhow::Result<Option<String>> {
        let sheet = sqlx::query_scalar("SELECT sheetId FROM lwodUrl ORDER BY datetime(date) DESC LIMIT 1")
            .fetch_optional(&self.lwod)
            .await?;
        Ok(sheet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// One connection so every query sees the same in-memory database.
    async fn catalog() -> (SqliteCatalog, SqlitePool) {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        for ddl in [
            "CREATE TABLE dggfeat (username TEXT, features TEXT)",
            "CREATE TABLE ytvods (vodid TEXT, title TEXT, starttime TEXT, endtime TEXT, thumbnail TEXT)",
            "CREATE TABLE rumble (public_id TEXT, embed_id TEXT, title TEXT, link TEXT, thumbnail TEXT, start_time TEXT, end_time TEXT)",
            "CREATE TABLE embeds (timest INTEGER, link TEXT, platform TEXT, channel TEXT, title TEXT)",
            "CREATE TABLE lwod (vodid TEXT, vidid TEXT, starttime TEXT, endtime TEXT, yttime INTEGER, game TEXT, subject TEXT, topic TEXT)",
            "CREATE TABLE lwodUrl (sheetId TEXT, date TEXT)",
        ] {
            sqlx::query(ddl).execute(&pool).await.unwrap();
        }
        (SqliteCatalog::from_pool(pool.clone()), pool)
    }

    #[tokio::test]
    async fn youtube_vods_newest_first_with_limit() {
        let (catalog, pool) = catalog().await;
        for (id, start) in [("a", "2024-01-01 10:00:00"), ("b", "2024-03-01 10:00:00"), ("c", "2024-02-01 10:00:00")] {
            sqlx::query("INSERT INTO ytvods VALUES (?, 'title', ?, '', 'thumb')")
                .bind(id)
                .bind(start)
                .execute(&pool)
                .await
                .unwrap();
        }

        let vods = catalog.youtube_vods(2).await.unwrap();
        let ids: Vec<_> = vods.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[tokio::test]
    async fn top_embeds_counts_recent_links() {
        let (catalog, pool) = catalog().await;
        for (age, link) in [(10, "x"), (20, "x"), (30, "y"), (100_000, "z")] {
            sqlx::query(
                "INSERT INTO embeds VALUES (CAST(strftime('%s', 'now') AS INTEGER) - ?, ?, 'youtube', 'chan', 'title')",
            )
            .bind(age)
            .bind(link)
            .execute(&pool)
            .await
            .unwrap();
        }

        let top = catalog.top_embeds(300, 5).await.unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].link, "x");
        assert_eq!(top[0].count, 2);
        assert_eq!(top[1].link, "y");
    }

    #[tokio::test]
    async fn lwod_lookups_and_latest_sheet() {
        let (catalog, pool) = catalog().await;
        sqlx::query("INSERT INTO lwod VALUES ('123', NULL, '00:00', '01:00', 0, 'game', 'subj', 'topic')")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO lwod VALUES (NULL, 'yt1', '', '', 42, 'g', 's', 't')")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO lwodUrl VALUES ('old', '2024-01-01'), ('new', '2024-06-01')")
            .execute(&pool)
            .await
            .unwrap();

        assert_eq!(catalog.lwod_by_twitch("123").await.unwrap().len(), 1);
        assert_eq!(catalog.lwod_by_youtube("yt1").await.unwrap()[0].time, 42);
        let all = catalog.lwod_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].youtube, None);
        assert_eq!(catalog.latest_lwod_sheet().await.unwrap().as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn missing_sheet_is_none() {
        let (catalog, _pool) = catalog().await;
        assert_eq!(catalog.latest_lwod_sheet().await.unwrap(), None);
        assert!(catalog.user_features().await.unwrap().is_empty());
    }
}

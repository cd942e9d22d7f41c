//! # ms-db-postgres
//!
//! `LogStore` over the Postgres chat log. The logger writes every line to
//! `logs` and additionally copies nuke-family lines to `nukes`, mutelinks
//! commands to `mutelinks` and bot phrase bans to `phrases`.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ms_core::models::{LogLine, Phrase};
use ms_core::traits::LogStore;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgRow};
use sqlx::Row;

const NUKE_COMMANDS: &str = "SELECT time, username, features, message FROM nukes \
     WHERE message ~* '^(!nuke|!meganuke|!aegis|!aegissingle|!an|!unnuke|!as)' \
     AND features ~ '(moderator|admin)' AND time >= $1 \
     ORDER BY time DESC LIMIT $2";

const NUKE_CONFIRMATIONS: &str = "SELECT time, username, features, message FROM nukes \
     WHERE message ~ 'Dropping the NUKE on' AND features ~ '(bot)' AND time >= $1 \
     ORDER BY time DESC LIMIT $2";

const MUTELINKS_COMMAND: &str = "SELECT time, username, features, message FROM mutelinks \
     WHERE message ~* '^(!mutelinks|!mutelink|!linkmute|!linksmute)' \
     AND features ~ '(moderator|admin)' \
     ORDER BY time DESC LIMIT 1";

pub struct PgLogStore {
    pool: PgPool,
}

impl PgLogStore {
    pub async fn connect(options: PgConnectOptions) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(options)
            .await
            .context("connecting to Postgres")?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn latest_time(&self, sql: &str) -> anyhow::Result<Option<DateTime<Utc>>> {
        let row = sqlx::query(sql).fetch_optional(&self.pool).await?;
        let time = row
            .map(|r| r.try_get::<DateTime<Utc>, _>("time"))
            .transpose()?;
        Ok(time)
    }

    async fn lines(
        &self,
        sql: &str,
        since: DateTime<Utc>,
        limit: i64,
    ) -> anyhow::Result<Vec<LogLine>> {
        let rows = sqlx::query(sql)
            .bind(since)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        let lines = rows.iter().map(to_log_line).collect::<Result<Vec<_>, _>>()?;
        tracing::debug!(rows = lines.len(), %since, "fetched moderation lines");
        Ok(lines)
    }
}

fn to_log_line(row: &PgRow) -> Result<LogLine, sqlx::Error> {
    Ok(LogLine {
        time: row.try_get("time")?,
        username: row.try_get("username")?,
        features: row.try_get("features")?,
        message: row.try_get("message")?,
    })
}

fn to_phrase(row: &PgRow) -> Result<Phrase, sqlx::Error> {
    Ok(Phrase {
        time: row.try_get("time")?,
        username: row.try_get("username")?,
        phrase: row.try_get("phrase")?,
        duration: row.try_get("duration")?,
        kind: row.try_get("type")?,
    })
}

#[async_trait]
impl LogStore for PgLogStore {
    async fn recent_nuke_commands(
        &self,
        since: DateTime<Utc>,
        limit: i64,
    ) -> anyhow::Result<Vec<LogLine>> {
        self.lines(NUKE_COMMANDS, since, limit).await
    }

    async fn recent_nuke_confirmations(
        &self,
        since: DateTime<Utc>,
        limit: i64,
    ) -> anyhow::Result<Vec<LogLine>> {
        self.lines(NUKE_CONFIRMATIONS, since, limit).await
    }

    async fn latest_mutelinks_command(&self) -> anyhow::Result<Option<LogLine>> {
        let row = sqlx::query(MUTELINKS_COMMAND)
            .fetch_optional(&self.pool)
            .await?;
        let line = row.as_ref().map(to_log_line).transpose()?;
        Ok(line)
    }

    async fn latest_phrase_time(&self) -> anyhow::Result<Option<DateTime<Utc>>> {
        self.latest_time("SELECT time FROM phrases ORDER BY time DESC LIMIT 1")
            .await
    }

    async fn latest_nuke_time(&self) -> anyhow::Result<Option<DateTime<Utc>>> {
        self.latest_time("SELECT time FROM nukes WHERE username != 'Bot' ORDER BY time DESC LIMIT 1")
            .await
    }

    async fn latest_mutelinks_time(&self) -> anyhow::Result<Option<DateTime<Utc>>> {
        self.latest_time("SELECT time FROM mutelinks ORDER BY time DESC LIMIT 1")
            .await
    }

    async fn phrases(&self, limit: Option<i64>) -> anyhow::Result<Vec<Phrase>> {
        // LIMIT NULL means no limit in Postgres
        let rows = sqlx::query(
            "SELECT time, username, phrase, duration, type FROM phrases ORDER BY time DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        let phrases = rows.iter().map(to_phrase).collect::<Result<Vec<_>, _>>()?;
        Ok(phrases)
    }

    async fn lines_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> anyhow::Result<Vec<LogLine>> {
        let rows = sqlx::query(
            "SELECT time, username, features, message FROM logs \
             WHERE time >= $1 AND time < $2 ORDER BY time",
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;
        let lines = rows.iter().map(to_log_line).collect::<Result<Vec<_>, _>>()?;
        tracing::debug!(rows = lines.len(), %from, %to, "fetched log range");
        Ok(lines)
    }

    async fn message_count_today(&self, username_pattern: &str) -> anyhow::Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT count(*) FROM logs WHERE username ~* $1 \
             AND time >= current_date::timestamp \
             AND time < current_date::timestamp + interval '1 day'",
        )
        .bind(username_pattern)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}

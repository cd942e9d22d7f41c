//! # ms-cache-redis
//!
//! `SettingsCache` over Redis database 0. The userscript publisher writes
//! flat string keys (`SCRIPT_VERSION`, `SCRIPT_NUKES_PROVIDER`, ...) that
//! are served back verbatim.

use anyhow::Context;
use async_trait::async_trait;
use deadpool_redis::redis::AsyncCommands;
use deadpool_redis::{Config, Pool, Runtime};
use ms_core::traits::SettingsCache;
use secrecy::{ExposeSecret, SecretString};

pub struct RedisSettingsCache {
    pool: Pool,
}

impl RedisSettingsCache {
    /// Builds the pool. No connection is made until the first read.
    pub fn connect(url: &SecretString) -> anyhow::Result<Self> {
        let pool = Config::from_url(url.expose_secret())
            .create_pool(Some(Runtime::Tokio1))
            .context("creating Redis pool")?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl SettingsCache for RedisSettingsCache {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let mut conn = self.pool.get().await.context("acquiring Redis connection")?;
        let value: Option<String> = conn
            .get(key)
            .await
            .with_context(|| format!("reading {key}"))?;
        if value.is_none() {
            tracing::debug!(key, "settings key not set");
        }
        Ok(value)
    }
}

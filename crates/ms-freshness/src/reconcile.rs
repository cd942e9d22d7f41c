//! # Reconciliation
//!
//! Re-derives the stamps from the log store on a fixed interval so missed
//! pushes and restarts heal themselves. A failed or slow query leaves the
//! stamp at its last good value and is retried on the next tick.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use ms_core::LogStore;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::warn;

use crate::registry::FreshnessRegistry;

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(15);
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Stamp channels backed by a store query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Phrases,
    Nukes,
    Mutelinks,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Channel::Phrases => "phrases",
            Channel::Nukes => "nukes",
            Channel::Mutelinks => "mutelinks",
        })
    }
}

pub struct Reconciler {
    store: Arc<dyn LogStore>,
    registry: FreshnessRegistry,
    interval: Duration,
    query_timeout: Duration,
}

impl Reconciler {
    pub fn new(store: Arc<dyn LogStore>, registry: FreshnessRegistry) -> Self {
        Self {
            store,
            registry,
            interval: DEFAULT_INTERVAL,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    /// One pass over every channel. Returns the channels whose query failed
    /// or timed out; their stamps were left untouched.
    pub async fn run_once(&self) -> Vec<Channel> {
        let (phrases, nukes, mutelinks) = tokio::join!(
            self.fetch(Channel::Phrases, self.store.latest_phrase_time()),
            self.fetch(Channel::Nukes, self.store.latest_nuke_time()),
            self.fetch(Channel::Mutelinks, self.store.latest_mutelinks_time()),
        );

        let mut failed = Vec::new();
        match phrases {
            Some(truth) => self.registry.reconcile_phrases(truth),
            None => failed.push(Channel::Phrases),
        }
        match nukes {
            Some(truth) => {
                self.registry.reconcile_nuke(truth);
            }
            None => failed.push(Channel::Nukes),
        }
        match mutelinks {
            Some(truth) => self.registry.reconcile_mutelinks(truth),
            None => failed.push(Channel::Mutelinks),
        }
        failed
    }

    /// Runs forever. Ticks missed while a pass was slow are skipped rather
    /// than stacked.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            self.run_once().await;
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Latest row time in epoch millis; no row counts as epoch zero.
    async fn fetch<F>(&self, channel: Channel, query: F) -> Option<i64>
    where
        F: Future<Output = anyhow::Result<Option<DateTime<Utc>>>>,
    {
        match tokio::time::timeout(self.query_timeout, query).await {
            Ok(Ok(latest)) => Some(latest.map_or(0, |t| t.timestamp_millis())),
            Ok(Err(err)) => {
                warn!(%channel, error = %format!("{err:#}"), "reconciliation query failed");
                None
            }
            Err(_) => {
                warn!(
                    %channel,
                    timeout_ms = self.query_timeout.as_millis() as u64,
                    "reconciliation query timed out"
                );
                None
            }
        }
    }
}

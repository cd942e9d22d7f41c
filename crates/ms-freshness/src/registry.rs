//! # Freshness Registry
//!
//! Four advisory "last changed at" stamps (epoch milliseconds) that polling
//! clients compare against to decide whether to refetch. Writers race by
//! design: pushes from the bot, the reconciliation loop and nuke expiry
//! timers. Each stamp is a single atomic and each mutation entry point
//! carries its own merge policy.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::clock::Clock;

/// How a nuke push treats expiry timers armed by earlier pushes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpiryPolicy {
    /// Every push arms its own timer; an older timer may still fire after a
    /// newer push and advance the stamp.
    #[default]
    Independent,
    /// A nuke or aegis push disarms every pending timer.
    Supersede,
}

/// Values served to clients. Phrase freshness is the max of additions and
/// removals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FreshnessSnapshot {
    pub phrases: i64,
    pub nukes: i64,
    pub mutelinks: i64,
}

struct Stamps {
    phrase_add: AtomicI64,
    phrase_remove: AtomicI64,
    nuke: AtomicI64,
    mutelinks: AtomicI64,
    /// Bumped by every nuke-channel push.
    nuke_generation: AtomicU64,
    expiry_delay: Duration,
    policy: ExpiryPolicy,
    clock: Arc<dyn Clock>,
}

/// Shared handle; clones point at the same stamps.
#[derive(Clone)]
pub struct FreshnessRegistry {
    inner: Arc<Stamps>,
}

impl FreshnessRegistry {
    /// All stamps start at epoch zero until the first reconciliation pass.
    pub fn new(clock: Arc<dyn Clock>, expiry_delay: Duration, policy: ExpiryPolicy) -> Self {
        Self {
            inner: Arc::new(Stamps {
                phrase_add: AtomicI64::new(0),
                phrase_remove: AtomicI64::new(0),
                nuke: AtomicI64::new(0),
                mutelinks: AtomicI64::new(0),
                nuke_generation: AtomicU64::new(0),
                expiry_delay,
                policy,
                clock,
            }),
        }
    }

    // ── Push updates (last writer wins) ─────────────────────────────────────

    pub fn phrase_added(&self, at: DateTime<Utc>) {
        let new = at.timestamp_millis();
        let previous = self.inner.phrase_add.swap(new, Ordering::SeqCst);
        info!(previous, new, "phrase push, updating phrase stamp");
    }

    pub fn phrase_removed(&self, at: DateTime<Utc>) {
        let new = at.timestamp_millis();
        let previous = self.inner.phrase_remove.swap(new, Ordering::SeqCst);
        info!(previous, new, "phrase removal push, updating phrase removal stamp");
    }

    pub fn mutelinks_changed(&self, at: DateTime<Utc>) {
        let new = at.timestamp_millis();
        let previous = self.inner.mutelinks.swap(new, Ordering::SeqCst);
        info!(previous, new, "mutelinks push, updating mutelinks stamp");
    }

    /// Records a nuke and arms its expiry: once the delay has elapsed the
    /// stamp jumps to the then-current time, telling clients the nuke has
    /// dropped out of the look-back window. The handle resolves when the
    /// timer has fired (or been disarmed).
    pub fn nuke_pushed(&self, at: DateTime<Utc>) -> JoinHandle<()> {
        let new = at.timestamp_millis();
        let previous = self.inner.nuke.swap(new, Ordering::SeqCst);
        let generation = self.inner.nuke_generation.fetch_add(1, Ordering::SeqCst) + 1;
        info!(previous, new, "nuke push, updating nuke stamp");

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            tokio::time::sleep(inner.expiry_delay).await;
            inner.expire_nuke(generation);
        })
    }

    /// Clear-all: nothing is active any more, so no expiry is armed.
    pub fn aegis_pushed(&self, at: DateTime<Utc>) {
        let new = at.timestamp_millis();
        let previous = self.inner.nuke.swap(new, Ordering::SeqCst);
        self.inner.nuke_generation.fetch_add(1, Ordering::SeqCst);
        info!(previous, new, "aegis push, updating nuke stamp");
    }

    // ── Reconciliation ─────────────────────────────────────────────────────

    /// Store truth overwrites the phrase addition stamp.
    pub fn reconcile_phrases(&self, truth: i64) {
        let previous = self.inner.phrase_add.swap(truth, Ordering::SeqCst);
        if previous != truth {
            info!(previous, new = truth, "reconciled phrase stamp");
        }
    }

    /// Store truth overwrites the mutelinks stamp.
    pub fn reconcile_mutelinks(&self, truth: i64) {
        let previous = self.inner.mutelinks.swap(truth, Ordering::SeqCst);
        if previous != truth {
            info!(previous, new = truth, "reconciled mutelinks stamp");
        }
    }

    /// The nuke stamp only moves forward so an expiry jump survives a store
    /// whose latest row is older. Returns whether the stamp advanced.
    pub fn reconcile_nuke(&self, truth: i64) -> bool {
        let previous = self.inner.nuke.fetch_max(truth, Ordering::SeqCst);
        let advanced = truth > previous;
        if advanced {
            info!(previous, new = truth, "reconciled nuke stamp");
        }
        advanced
    }

    // ── Reads ─────────────────────────────────────────────────────────────

    pub fn phrase_stamp(&self) -> i64 {
        let added = self.inner.phrase_add.load(Ordering::SeqCst);
        let removed = self.inner.phrase_remove.load(Ordering::SeqCst);
        added.max(removed)
    }

    pub fn nuke_stamp(&self) -> i64 {
        self.inner.nuke.load(Ordering::SeqCst)
    }

    pub fn mutelinks_stamp(&self) -> i64 {
        self.inner.mutelinks.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> FreshnessSnapshot {
        FreshnessSnapshot {
            phrases: self.phrase_stamp(),
            nukes: self.nuke_stamp(),
            mutelinks: self.mutelinks_stamp(),
        }
    }
}

impl Stamps {
    fn expire_nuke(&self, generation: u64) {
        if self.policy == ExpiryPolicy::Supersede
            && self.nuke_generation.load(Ordering::SeqCst) != generation
        {
            debug!(generation, "nuke expiry superseded by a newer push");
            return;
        }
        let now = self.clock.now_millis();
        let previous = self.nuke.swap(now, Ordering::SeqCst);
        info!(previous, new = now, "nuke advisory window elapsed, advancing nuke stamp");
    }
}

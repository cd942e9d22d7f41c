//! # Reconstructors
//!
//! Rebuild the currently active nukes and the mutelinks policy from the
//! moderation commands in the chat log. Nothing is cached: every query
//! re-reads the bounded look-back window and replays it.

use std::collections::HashSet;
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, TimeDelta, Utc};

use crate::command::{self, Command};
use crate::models::{ActiveNuke, LogLine, MuteLinkState};
use crate::traits::LogStore;

/// Commands older than this no longer affect the active nuke list.
pub const LOOKBACK_WINDOW: Duration = Duration::from_secs(5 * 60);

/// Row cap for both the command and the confirmation query.
pub const ROW_LIMIT: i64 = 10;

/// `"Dropping the NUKE on "`
const CONFIRMATION_PREFIX_LEN: usize = 21;
/// `" victims"`
const CONFIRMATION_SUFFIX_LEN: usize = 8;

/// Replays moderator commands (newest first) into the active nuke list.
///
/// The scan stops at the first clear-all: everything older is moot. A
/// cancellation is always seen before the older nuke it targets, so its key
/// is remembered for the rest of the pass and may drop several candidates.
///
/// Victim counts are attached from the earliest confirmation in the batch
/// whenever it is not later than the command (1 s tolerance). This is an
/// approximation, not a per-command pairing.
pub fn reconstruct_nukes(commands: &[LogLine], confirmations: &[LogLine]) -> Vec<ActiveNuke> {
    let earliest_confirmation = confirmations.iter().min_by_key(|c| c.time.timestamp());
    let mut cancelled: HashSet<String> = HashSet::new();
    let mut active = Vec::new();

    for line in commands {
        match command::parse(&line.message) {
            Some(Command::ClearAll) => break,
            Some(Command::Cancel { key }) => {
                if let Some(key) = key {
                    cancelled.insert(key);
                }
            }
            Some(Command::Nuke { kind, targets }) => {
                let victims = earliest_confirmation
                    .filter(|c| c.time.timestamp() < line.time.timestamp() + 1)
                    .and_then(|c| victim_count(&c.message));

                for target in targets {
                    let pattern = target.pattern.normalized();
                    if cancelled.contains(&pattern) {
                        continue;
                    }
                    active.push(ActiveNuke {
                        time: line.time,
                        kind,
                        duration: target.duration,
                        pattern,
                        victims: victims.clone(),
                    });
                }
            }
            _ => {}
        }
    }

    active
}

fn victim_count(message: &str) -> Option<String> {
    let end = message.len().checked_sub(CONFIRMATION_SUFFIX_LEN)?;
    message
        .get(CONFIRMATION_PREFIX_LEN..end)
        .filter(|count| !count.is_empty())
        .map(str::to_string)
}

/// Interprets the latest mutelinks command. `None` means the line does not
/// carry a recognizable status.
pub fn reconstruct_mutelinks(line: &LogLine) -> Option<MuteLinkState> {
    match command::parse(&line.message)? {
        Command::MuteLinks { status, duration } => Some(MuteLinkState {
            time: line.time,
            status,
            duration,
            user: line.username.clone(),
        }),
        _ => None,
    }
}

/// Fetches the look-back window ending at `now` and reconstructs it.
pub async fn load_active_nukes(
    store: &dyn LogStore,
    now: DateTime<Utc>,
) -> anyhow::Result<Vec<ActiveNuke>> {
    let since = now - TimeDelta::seconds(LOOKBACK_WINDOW.as_secs() as i64);
    let commands = store
        .recent_nuke_commands(since, ROW_LIMIT)
        .await
        .context("fetching nuke commands")?;
    let confirmations = store
        .recent_nuke_confirmations(since, ROW_LIMIT)
        .await
        .context("fetching nuke confirmations")?;

    Ok(reconstruct_nukes(&commands, &confirmations))
}

/// `Ok(None)` is "no data", distinct from a store failure.
pub async fn load_mutelinks_state(store: &dyn LogStore) -> anyhow::Result<Option<MuteLinkState>> {
    let line = store
        .latest_mutelinks_command()
        .await
        .context("fetching mutelinks command")?;
    Ok(line.as_ref().and_then(reconstruct_mutelinks))
}

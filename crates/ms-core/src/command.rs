//! # Command Parser
//!
//! Turns the free text of a chat log line into a typed moderation command.
//! Pure functions, no I/O. Malformed input never errors: unknown commands
//! yield `None` and missing pieces fall back to defaults.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{LinkMuteStatus, NukeKind};

/// Duration applied when a nuke or mutelinks command omits one.
pub const DEFAULT_DURATION: &str = "10m";

/// `(duration)? (/regex/)? (free text)`, one match per filter.
static NUKE_TARGET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d+[smhdwSMHDW])?\s?(?:/(.*)/)?(.*)").expect("nuke target regex")
});

static REGEX_LITERAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"/(.*)/").expect("regex literal"));

static MUTELINKS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(on|off|all)(?:\s+(\d+[smhdwSMHDW]))?").expect("mutelinks regex")
});

/// A nuke filter pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pattern {
    /// Written as `/inner/`; holds the inner text.
    Regex(String),
    Literal(String),
}

impl Pattern {
    /// The text without delimiters.
    pub fn raw(&self) -> &str {
        match self {
            Pattern::Regex(inner) | Pattern::Literal(inner) => inner,
        }
    }

    /// Form used for cancellation matching and output.
    /// A regex never equals a literal with the same inner text.
    pub fn normalized(&self) -> String {
        match self {
            Pattern::Regex(inner) => format!("/{inner}/"),
            Pattern::Literal(word) => word.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NukeTarget {
    pub duration: String,
    pub pattern: Pattern,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Nuke {
        kind: NukeKind,
        targets: Vec<NukeTarget>,
    },
    /// Aegis: every active nuke ends now.
    ClearAll,
    /// Cancels one nuke by normalized pattern. `None` cancels nothing.
    Cancel { key: Option<String> },
    MuteLinks {
        status: LinkMuteStatus,
        duration: String,
    },
}

/// Parses a chat message. Returns `None` for anything that is not a
/// recognized moderation command.
pub fn parse(message: &str) -> Option<Command> {
    let body = message.strip_prefix('!')?;
    let (token, rest) = body.split_once(' ').unwrap_or((body, ""));

    match token.to_ascii_lowercase().as_str() {
        "aegis" => Some(Command::ClearAll),
        "aegissingle" | "an" | "unnuke" | "as" => Some(Command::Cancel {
            key: cancellation_key(rest),
        }),
        "nuke" => Some(Command::Nuke {
            kind: NukeKind::Nuke,
            targets: nuke_targets(rest),
        }),
        "meganuke" => Some(Command::Nuke {
            kind: NukeKind::MegaNuke,
            targets: nuke_targets(rest),
        }),
        "mutelinks" | "mutelink" | "linkmute" | "linksmute" => mute_links(rest),
        _ => None,
    }
}

fn cancellation_key(rest: &str) -> Option<String> {
    if rest.is_empty() {
        return None;
    }
    match REGEX_LITERAL.captures(rest) {
        Some(caps) => Some(format!("/{}/", &caps[1])),
        None => Some(rest.to_string()),
    }
}

fn nuke_targets(rest: &str) -> Vec<NukeTarget> {
    NUKE_TARGET
        .captures_iter(rest)
        .filter_map(|caps| {
            let duration = caps
                .get(1)
                .map_or(DEFAULT_DURATION, |m| m.as_str())
                .to_string();
            let pattern = match (caps.get(2), caps.get(3)) {
                (Some(inner), _) if !inner.as_str().is_empty() => {
                    Pattern::Regex(inner.as_str().to_string())
                }
                (_, Some(word)) if !word.as_str().is_empty() => {
                    Pattern::Literal(word.as_str().to_string())
                }
                _ => return None,
            };
            Some(NukeTarget { duration, pattern })
        })
        .collect()
}

fn mute_links(rest: &str) -> Option<Command> {
    let caps = MUTELINKS.captures(rest)?;
    let status = match &caps[1] {
        "on" => LinkMuteStatus::On,
        "off" => LinkMuteStatus::Off,
        _ => LinkMuteStatus::All,
    };
    let duration = caps
        .get(2)
        .map_or(DEFAULT_DURATION, |m| m.as_str())
        .to_string();
    Some(Command::MuteLinks { status, duration })
}

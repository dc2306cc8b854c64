//! Online/offline run mode, chosen once per run.

use std::fmt;

pub const MODE_PROMPT: &str = "Fetch prices from the network? (y/n): ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Cache first, network for misses; today's snapshot is persisted.
    Online,
    /// Cache only; nothing is persisted.
    Offline,
}

impl RunMode {
    /// Interpret an answer to [`MODE_PROMPT`]. Empty means Online.
    pub fn from_answer(answer: &str) -> Option<Self> {
        match answer.trim().to_lowercase().as_str() {
            "" | "y" | "yes" => Some(RunMode::Online),
            "n" | "no" => Some(RunMode::Offline),
            _ => None,
        }
    }

    pub fn is_online(self) -> bool {
        self == RunMode::Online
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::Online => f.write_str("online"),
            RunMode::Offline => f.write_str("offline"),
        }
    }
}

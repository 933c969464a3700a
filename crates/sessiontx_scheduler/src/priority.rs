//! Task priorities and queue overview.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Priority of a queued task. Higher priorities are dispatched first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Background work.
    Low = 1,
    /// Ordinary operations.
    Normal = 2,
    /// Operations that should jump ahead of ordinary work.
    Important = 3,
    /// Operations that must run next.
    Critical = 4,
}

impl Priority {
    /// All priorities, lowest first.
    pub const ALL: [Priority; 4] = [
        Priority::Low,
        Priority::Normal,
        Priority::Important,
        Priority::Critical,
    ];

    /// Lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::Important => "important",
            Priority::Critical => "critical",
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "normal" => Ok(Priority::Normal),
            "important" => Ok(Priority::Important),
            "critical" => Ok(Priority::Critical),
            other => Err(format!("unknown priority: {other}")),
        }
    }
}

/// Count of pending (not yet dispatched) tasks per priority.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TasksOverview {
    /// Pending low priority tasks.
    pub low: u64,
    /// Pending normal priority tasks.
    pub normal: u64,
    /// Pending important priority tasks.
    pub important: u64,
    /// Pending critical priority tasks.
    pub critical: u64,
    /// All pending tasks.
    pub total: u64,
}

impl TasksOverview {
    pub(crate) fn count(&mut self, priority: Priority) {
        match priority {
            Priority::Low => self.low += 1,
            Priority::Normal => self.normal += 1,
            Priority::Important => self.important += 1,
            Priority::Critical => self.critical += 1,
        }
        self.total += 1;
    }
}

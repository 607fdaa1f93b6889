//! Pending change intents queued for transmission

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::HabitId;
use crate::error::Error;

/// Kind of change a queued intent represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeAction {
    Create,
    Update,
    Delete,
}

impl ChangeAction {
    /// Column representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATE" => Ok(Self::Create),
            "UPDATE" => Ok(Self::Update),
            "DELETE" => Ok(Self::Delete),
            other => Err(Error::InvalidInput(format!("unknown change action: {other}"))),
        }
    }
}

/// An entry in the pending-change queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeIntent {
    /// Auto-assigned, strictly increasing; defines replay order
    pub queue_id: i64,
    /// Target record
    pub habit_id: HabitId,
    pub action: ChangeAction,
    /// Enqueue timestamp (Unix ms), diagnostics only
    pub enqueued_at: i64,
    /// Failed transmission attempts so far
    pub retry_count: u32,
}

impl ChangeIntent {
    /// Build an intent that has not been assigned a queue id yet.
    pub fn pending(habit_id: HabitId, action: ChangeAction) -> Self {
        Self {
            queue_id: 0,
            habit_id,
            action,
            enqueued_at: crate::util::unix_millis_now(),
            retry_count: 0,
        }
    }
}

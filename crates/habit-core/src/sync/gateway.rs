//! Remote gateway contract and wire representation.

use std::future::Future;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{HabitId, HabitRecord};

/// Server-side representation of a habit.
///
/// Only the fields the server stores travel over the wire; streaks and the
/// local bookkeeping flags never leave the device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteHabit {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub habit_name: Option<String>,
    #[serde(default)]
    pub days: Vec<String>,
    #[serde(default)]
    pub reminder_time: Option<String>,
    #[serde(default)]
    pub is_checked: bool,
}

impl RemoteHabit {
    /// Parsed record id, if the server sent a usable one.
    pub fn habit_id(&self) -> Option<HabitId> {
        self.id.as_deref().and_then(|id| id.parse().ok())
    }
}

impl From<&HabitRecord> for RemoteHabit {
    fn from(habit: &HabitRecord) -> Self {
        Self {
            id: Some(habit.id.to_string()),
            user_id: Some(habit.owner_id.clone()),
            habit_name: Some(habit.name.clone()),
            days: habit
                .active_days
                .iter()
                .map(|day| day.as_str().to_string())
                .collect(),
            reminder_time: Some(habit.reminder_time.clone()),
            is_checked: habit.is_checked,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    /// The request never produced a response (offline, DNS, timeout).
    #[error("Remote unreachable: {0}")]
    Transport(String),
    /// The server refused the payload; retrying the same data will not help.
    #[error("Remote rejected request: {message} ({status})")]
    Rejected { status: u16, message: String },
    /// The server failed while handling the request.
    #[error("Remote server error: {message} ({status})")]
    Server { status: u16, message: String },
    #[error("Invalid remote payload: {0}")]
    InvalidPayload(String),
    #[error("Remote gateway unavailable: {0}")]
    Unavailable(String),
}

impl GatewayError {
    /// Whether the server deliberately refused the request.
    pub const fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Remote habit API.
///
/// Calls are independent and idempotent per record: uploading the same
/// snapshot twice, or deleting a record the server no longer has, succeeds.
pub trait RemoteGateway: Send + Sync + 'static {
    /// All habits the server holds for `owner_id`.
    fn list_records(
        &self,
        owner_id: &str,
    ) -> impl Future<Output = GatewayResult<Vec<RemoteHabit>>> + Send;

    /// Create or replace a habit by id; returns the server's copy.
    fn upsert_record(
        &self,
        habit: &RemoteHabit,
    ) -> impl Future<Output = GatewayResult<RemoteHabit>> + Send;

    /// Delete a habit by id.
    fn delete_record(&self, id: &HabitId) -> impl Future<Output = GatewayResult<()>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use crate::models::Weekday;
    use std::collections::BTreeSet;

    #[test]
    fn serializes_camel_case_wire_fields() {
        let habit = HabitRecord::new(
            "u1",
            "Read",
            BTreeSet::from([Weekday::Friday, Weekday::Monday]),
            "07:30",
        );
        let payload = serde_json::to_value(RemoteHabit::from(&habit)).unwrap();

        assert_eq!(payload["id"], habit.id.as_str());
        assert_eq!(payload["userId"], "u1");
        assert_eq!(payload["habitName"], "Read");
        assert_eq!(payload["days"], serde_json::json!(["Monday", "Friday"]));
        assert_eq!(payload["reminderTime"], "07:30");
        assert_eq!(payload["isChecked"], false);
        assert!(payload.get("currentStreak").is_none());
    }

    #[test]
    fn deserializes_sparse_payload() {
        let remote: RemoteHabit =
            serde_json::from_str(r#"{"id":"abc","habitName":"Walk","extra":1}"#).unwrap();
        assert_eq!(remote.habit_id().unwrap().as_str(), "abc");
        assert_eq!(remote.user_id, None);
        assert!(remote.days.is_empty());
        assert!(!remote.is_checked);
    }

    #[test]
    fn blank_id_is_not_usable() {
        let remote = RemoteHabit {
            id: Some("  ".to_string()),
            ..RemoteHabit::default()
        };
        assert!(remote.habit_id().is_none());
    }

    #[test]
    fn only_rejections_are_rejections() {
        assert!(GatewayError::Rejected {
            status: 422,
            message: "bad".into()
        }
        .is_rejection());
        assert!(!GatewayError::Server {
            status: 503,
            message: "down".into()
        }
        .is_rejection());
        assert!(!GatewayError::Transport("offline".into()).is_rejection());
    }
}

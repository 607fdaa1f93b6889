//! Reconciling a remote snapshot with local records.
//!
//! Field authority:
//!
//! | Field                              | Authority                          |
//! |------------------------------------|------------------------------------|
//! | `name`, `active_days`, `reminder_time` | server, unless local edits are pending |
//! | `is_checked`, streaks, `last_checked_date` | client                     |
//! | `is_deleted`, `is_synced`, `sync_blocked`, `last_modified` | client      |
//!
//! A record missing from the remote snapshot is never deleted locally. The
//! fetch is already scoped to one owner, so an entry without `userId` is taken
//! as theirs; one naming another owner is skipped.

use std::collections::BTreeSet;

use crate::models::{normalize_reminder_time, HabitRecord, Weekday};

use super::gateway::RemoteHabit;

/// What reconciliation does with one remote habit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeDecision {
    /// Unknown locally: store the server's copy.
    Insert(HabitRecord),
    /// Known locally: store the merged record.
    Update(HabitRecord),
    Unchanged,
    /// Unusable remote entry, with the reason.
    Skip(&'static str),
}

/// Merge one remote habit into its local counterpart, if any.
pub fn merge_remote(
    local: Option<&HabitRecord>,
    remote: &RemoteHabit,
    owner_id: &str,
    now: i64,
) -> MergeDecision {
    let Some(id) = remote.habit_id() else {
        return MergeDecision::Skip("missing id");
    };
    if remote
        .user_id
        .as_deref()
        .is_some_and(|user_id| user_id != owner_id)
    {
        return MergeDecision::Skip("belongs to another owner");
    }

    let Some(local) = local else {
        return MergeDecision::Insert(HabitRecord {
            id,
            owner_id: owner_id.to_string(),
            name: remote.habit_name.clone().unwrap_or_default(),
            active_days: remote_days(remote),
            reminder_time: remote_reminder(remote, ""),
            is_checked: false,
            current_streak: 0,
            longest_streak: 0,
            last_checked_date: None,
            is_synced: true,
            is_deleted: false,
            sync_blocked: false,
            last_modified: now,
        });
    };

    if local.owner_id != owner_id {
        return MergeDecision::Skip("local record belongs to another owner");
    }
    // Pending local edits or a pending delete outrank the server's copy.
    if local.is_deleted || !local.is_synced {
        return MergeDecision::Unchanged;
    }

    let merged = HabitRecord {
        name: remote
            .habit_name
            .clone()
            .unwrap_or_else(|| local.name.clone()),
        active_days: remote_days(remote),
        reminder_time: remote_reminder(remote, &local.reminder_time),
        ..local.clone()
    };

    if merged == *local {
        MergeDecision::Unchanged
    } else {
        MergeDecision::Update(merged)
    }
}

fn remote_days(remote: &RemoteHabit) -> BTreeSet<Weekday> {
    remote
        .days
        .iter()
        .filter_map(|token| match token.parse() {
            Ok(day) => Some(day),
            Err(_) => {
                tracing::warn!("Ignoring unknown remote weekday {token:?}");
                None
            }
        })
        .collect()
}

fn remote_reminder(remote: &RemoteHabit, fallback: &str) -> String {
    remote
        .reminder_time
        .as_deref()
        .and_then(|value| normalize_reminder_time(value).ok())
        .unwrap_or_else(|| fallback.to_string())
}

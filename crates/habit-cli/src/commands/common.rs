use std::collections::BTreeSet;
use std::env;
use std::path::{Path, PathBuf};

use chrono::Utc;
use habit_core::{HabitRecord, HabitStore, SyncConfig, Weekday};
use serde::Serialize;

use crate::error::CliError;

/// Owner used when neither `--owner` nor `HABIT_OWNER_ID` is given.
pub const DEFAULT_OWNER: &str = "local";

#[derive(Debug, Serialize)]
pub struct HabitListItem {
    pub id: String,
    pub name: String,
    pub days: Vec<String>,
    pub reminder_time: String,
    pub checked: bool,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub last_checked_date: Option<String>,
    pub synced: bool,
    pub sync_blocked: bool,
}

pub fn habit_to_list_item(habit: &HabitRecord) -> HabitListItem {
    HabitListItem {
        id: habit.id.to_string(),
        name: habit.name.clone(),
        days: habit
            .active_days
            .iter()
            .map(|day| day.as_str().to_string())
            .collect(),
        reminder_time: habit.reminder_time.clone(),
        checked: habit.is_checked,
        current_streak: habit.current_streak,
        longest_streak: habit.longest_streak,
        last_checked_date: habit.last_checked_date.map(|date| date.to_string()),
        synced: habit.is_synced,
        sync_blocked: habit.sync_blocked,
    }
}

pub fn format_habit_lines(habits: &[HabitRecord]) -> Vec<String> {
    habits
        .iter()
        .map(|habit| {
            let id = habit.id.to_string();
            let short_id = id.chars().take(13).collect::<String>();
            let mark = if habit.is_checked { "[x]" } else { "[ ]" };
            let name = truncate(&habit.name, 30);
            let days = format_days(&habit.active_days);
            let streak = format!("{}/{}", habit.current_streak, habit.longest_streak);
            let sync_marker = sync_marker(habit);

            if sync_marker.is_empty() {
                format!(
                    "{short_id:<13}  {mark} {name:<30}  {days:<20}  {}  streak {streak}",
                    habit.reminder_time
                )
            } else {
                format!(
                    "{short_id:<13}  {mark} {name:<30}  {days:<20}  {}  streak {streak:<7}  {sync_marker}",
                    habit.reminder_time
                )
            }
        })
        .collect()
}

fn sync_marker(habit: &HabitRecord) -> &'static str {
    if habit.sync_blocked {
        "blocked"
    } else if habit.is_synced {
        ""
    } else {
        "pending"
    }
}

pub fn format_days(days: &BTreeSet<Weekday>) -> String {
    if days.len() == Weekday::ALL.len() {
        return "every day".to_string();
    }
    days.iter()
        .map(|day| day.as_str().chars().take(3).collect::<String>())
        .collect::<Vec<_>>()
        .join(",")
}

pub fn truncate(value: &str, max_chars: usize) -> String {
    let collapsed = value.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn format_sync_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else {
        format!("{}w ago", diff / week)
    }
}

pub fn describe_sync_time(timestamp_ms: Option<i64>) -> String {
    timestamp_ms.map_or_else(
        || "never".to_string(),
        |timestamp_ms| {
            let now_ms = Utc::now().timestamp_millis();
            format!(
                "{} ({})",
                format_relative_time(timestamp_ms, now_ms),
                format_sync_timestamp(timestamp_ms)
            )
        },
    )
}

pub fn resolve_habit_name(name_parts: &[String]) -> Result<String, CliError> {
    let name = name_parts.join(" ");
    let trimmed = name.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyName)
    } else {
        Ok(trimmed.to_string())
    }
}

pub fn normalize_habit_identifier(id: &str) -> Result<String, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyHabitId)
    } else {
        Ok(trimmed.to_string())
    }
}

/// Find the habit whose id equals `query` or uniquely starts with it.
pub fn match_habit<'a>(
    habits: &'a [HabitRecord],
    query: &str,
) -> Result<&'a HabitRecord, CliError> {
    if let Some(habit) = habits.iter().find(|habit| habit.id.as_str() == query) {
        return Ok(habit);
    }

    let matching = habits
        .iter()
        .filter(|habit| habit.id.as_str().starts_with(query))
        .collect::<Vec<_>>();

    match matching.as_slice() {
        [] => Err(CliError::HabitNotFound(query.to_string())),
        [habit] => Ok(*habit),
        _ => {
            let options = matching
                .iter()
                .take(3)
                .map(|habit| habit.id.as_str().chars().take(13).collect::<String>())
                .collect::<Vec<_>>()
                .join(", ");

            Err(CliError::AmbiguousHabitId(format!(
                "ID prefix '{query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

/// Resolve an id or prefix among the owner's visible habits.
pub async fn resolve_habit(
    store: &HabitStore,
    owner: &str,
    query: &str,
) -> Result<HabitRecord, CliError> {
    let query = normalize_habit_identifier(query)?;
    let habits = store.list_records(owner).await?;
    match_habit(&habits, &query).cloned()
}

pub fn resolve_owner(cli_owner: Option<String>) -> String {
    cli_owner
        .or_else(|| env::var("HABIT_OWNER_ID").ok())
        .map(|owner| owner.trim().to_string())
        .filter(|owner| !owner.is_empty())
        .unwrap_or_else(|| DEFAULT_OWNER.to_string())
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("HABIT_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("habit-sync")
        .join("habits.db")
}

pub async fn open_store(path: &Path) -> Result<HabitStore, CliError> {
    Ok(HabitStore::open_path(path.to_path_buf()).await?)
}

/// Load sync settings from the environment, using `owner` for this device.
pub fn load_sync_config(owner: &str) -> Result<SyncConfig, CliError> {
    sync_config_from(|key| env::var(key).ok(), owner)
}

pub fn sync_config_from(
    lookup: impl Fn(&str) -> Option<String>,
    owner: &str,
) -> Result<SyncConfig, CliError> {
    SyncConfig::from_lookup_for_owner(lookup, owner)?.ok_or(CliError::SyncNotConfigured)
}

//! Habit record model

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Stable identifier for a habit record.
///
/// Locally created habits use UUID v7 (time-sortable). Records that originate on
/// the server keep whatever id the server assigned, so the inner value is an
/// opaque string rather than a parsed UUID.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HabitId(String);

impl HabitId {
    /// Create a new unique habit ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for HabitId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for HabitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for HabitId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidInput("habit id cannot be empty".into()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

/// Day of the week a habit is scheduled on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Weekday {
    pub const ALL: [Self; 7] = [
        Self::Monday,
        Self::Tuesday,
        Self::Wednesday,
        Self::Thursday,
        Self::Friday,
        Self::Saturday,
        Self::Sunday,
    ];

    /// Full English day name, the token stored locally and sent over the wire.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Monday => "Monday",
            Self::Tuesday => "Tuesday",
            Self::Wednesday => "Wednesday",
            Self::Thursday => "Thursday",
            Self::Friday => "Friday",
            Self::Saturday => "Saturday",
            Self::Sunday => "Sunday",
        }
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Weekday {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let token = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|day| {
                let name = day.as_str().to_ascii_lowercase();
                token == name || (token.len() == 3 && name.starts_with(&token))
            })
            .ok_or_else(|| Error::InvalidInput(format!("unknown weekday: {s}")))
    }
}

/// Parse a list of weekday tokens into a set, ignoring blanks.
pub fn parse_days<S: AsRef<str>>(tokens: &[S]) -> Result<BTreeSet<Weekday>> {
    tokens
        .iter()
        .map(AsRef::as_ref)
        .filter(|token| !token.trim().is_empty())
        .map(str::parse)
        .collect()
}

/// Render days as the comma-separated column format.
pub fn join_days(days: &BTreeSet<Weekday>) -> String {
    days.iter()
        .map(|day| day.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

/// Validate and canonicalize a `HH:MM` reminder time.
pub fn normalize_reminder_time(value: &str) -> Result<String> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .map(|time| time.format("%H:%M").to_string())
        .map_err(|_| Error::InvalidInput(format!("reminder time must be HH:MM, got '{value}'")))
}

/// A habit tracked by a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HabitRecord {
    /// Unique identifier
    pub id: HabitId,
    /// Owning user; records are partitioned by owner
    pub owner_id: String,
    /// Display label
    pub name: String,
    /// Scheduled weekdays
    pub active_days: BTreeSet<Weekday>,
    /// Reminder wall-clock time (`HH:MM`)
    pub reminder_time: String,
    /// Whether today's occurrence is complete
    pub is_checked: bool,
    pub current_streak: u32,
    pub longest_streak: u32,
    /// Date of the most recent check-in
    pub last_checked_date: Option<NaiveDate>,
    /// Local state matches the last server-acknowledged state
    pub is_synced: bool,
    /// Soft delete flag for sync
    pub is_deleted: bool,
    /// Pending changes exceeded the retry cap and are no longer transmitted
    pub sync_blocked: bool,
    /// Local modification marker (Unix ms)
    pub last_modified: i64,
}

impl HabitRecord {
    /// Create a new, unsynced habit for `owner_id`.
    pub fn new(
        owner_id: impl Into<String>,
        name: impl Into<String>,
        active_days: BTreeSet<Weekday>,
        reminder_time: impl Into<String>,
    ) -> Self {
        Self {
            id: HabitId::new(),
            owner_id: owner_id.into(),
            name: name.into(),
            active_days,
            reminder_time: reminder_time.into(),
            is_checked: false,
            current_streak: 0,
            longest_streak: 0,
            last_checked_date: None,
            is_synced: false,
            is_deleted: false,
            sync_blocked: false,
            last_modified: crate::util::unix_millis_now(),
        }
    }

    /// Whether the habit is scheduled on the given date.
    pub fn is_active_on(&self, date: NaiveDate) -> bool {
        use chrono::Datelike;

        let day = Weekday::ALL[date.weekday().num_days_from_monday() as usize];
        self.active_days.contains(&day)
    }
}

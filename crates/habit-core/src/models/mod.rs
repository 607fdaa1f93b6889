//! Data models for habit-sync

mod change;
mod habit;

pub use change::{ChangeAction, ChangeIntent};
pub use habit::{
    join_days, normalize_reminder_time, parse_days, HabitId, HabitRecord, Weekday,
};

//! Streak accounting for check-ins.
//!
//! Streaks are derived locally and never taken from the server. The rule is
//! applied once per unchecked-to-checked transition; un-checking leaves the
//! streak untouched.

use chrono::NaiveDate;

/// Streak fields after a check-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreakUpdate {
    pub current_streak: u32,
    pub longest_streak: u32,
    pub last_checked_date: NaiveDate,
}

/// Compute streak state for a check-in on `today`.
///
/// - last check-in yesterday: the streak continues (+1)
/// - last check-in today: re-check, no double count
/// - anything else (gap, future date, never checked): the streak restarts at 1
pub fn apply_check_in(
    previous_streak: u32,
    previous_longest: u32,
    previous_last_checked: Option<NaiveDate>,
    today: NaiveDate,
) -> StreakUpdate {
    let yesterday = today.pred_opt();

    let current_streak = match previous_last_checked {
        Some(date) if Some(date) == yesterday => previous_streak.saturating_add(1),
        Some(date) if date == today => previous_streak,
        _ => 1,
    };

    StreakUpdate {
        current_streak,
        longest_streak: current_streak.max(previous_longest),
        last_checked_date: today,
    }
}

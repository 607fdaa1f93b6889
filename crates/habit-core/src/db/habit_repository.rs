//! Habit record repository implementation

use chrono::NaiveDate;
use libsql::{params, Connection, Row};

use crate::error::{Error, Result};
use crate::models::{join_days, parse_days, HabitId, HabitRecord};

const HABIT_COLUMNS: &str = "id, owner_id, name, active_days, reminder_time, is_checked, \
     current_streak, longest_streak, last_checked_date, is_synced, is_deleted, sync_blocked, \
     last_modified";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Trait for habit storage operations (async)
#[allow(async_fn_in_trait)]
pub trait HabitRepository {
    /// Insert or fully replace a record by id
    async fn upsert(&self, habit: &HabitRecord) -> Result<()>;

    /// Get a record by id, including soft-deleted rows
    async fn get_by_id(&self, id: &HabitId) -> Result<Option<HabitRecord>>;

    /// Get a record by id, excluding soft-deleted rows
    async fn get_visible(&self, id: &HabitId) -> Result<Option<HabitRecord>>;

    /// List visible records for an owner, oldest first
    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<HabitRecord>>;

    /// List visible records for an owner that are checked
    async fn list_completed(&self, owner_id: &str) -> Result<Vec<HabitRecord>>;

    /// Soft delete a record; returns whether a visible row was affected
    async fn soft_delete(&self, id: &HabitId, timestamp: i64) -> Result<bool>;

    /// List records awaiting transmission
    async fn list_unsynced(&self) -> Result<Vec<HabitRecord>>;

    /// Set `is_synced` without touching any other column
    async fn mark_synced(&self, id: &HabitId) -> Result<()>;

    /// Clear `is_synced` without touching any other column
    async fn mark_unsynced(&self, id: &HabitId) -> Result<()>;

    /// Physically remove one record
    async fn purge(&self, id: &HabitId) -> Result<()>;

    /// Physically remove rows that are both deleted and synced
    async fn purge_deleted_and_synced(&self) -> Result<u64>;

    /// Flag or clear a record's quarantine marker
    async fn set_sync_blocked(&self, id: &HabitId, blocked: bool) -> Result<()>;

    /// List quarantined records for an owner, including soft-deleted ones
    async fn list_blocked(&self, owner_id: &str) -> Result<Vec<HabitRecord>>;
}

/// libSQL implementation of `HabitRepository`
pub struct LibSqlHabitRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlHabitRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    async fn query_habits(
        &self,
        where_clause: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<Vec<HabitRecord>> {
        let sql = format!("SELECT {HABIT_COLUMNS} FROM habits WHERE {where_clause}");
        let mut rows = self.conn.query(&sql, params).await?;

        let mut habits = Vec::new();
        while let Some(row) = rows.next().await? {
            habits.push(parse_habit(&row)?);
        }
        Ok(habits)
    }

    async fn query_one(
        &self,
        where_clause: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<Option<HabitRecord>> {
        Ok(self.query_habits(where_clause, params).await?.into_iter().next())
    }
}

/// Parse a habit from a database row
fn parse_habit(row: &Row) -> Result<HabitRecord> {
    let id: String = row.get(0)?;
    let active_days: String = row.get(3)?;
    let last_checked: String = row.get(8)?;

    let last_checked_date = if last_checked.is_empty() {
        None
    } else {
        Some(
            NaiveDate::parse_from_str(&last_checked, DATE_FORMAT).map_err(|_| {
                Error::Database(format!("invalid last_checked_date for {id}: {last_checked}"))
            })?,
        )
    };

    Ok(HabitRecord {
        active_days: parse_days(&active_days.split(',').collect::<Vec<_>>())?,
        id: id.parse()?,
        owner_id: row.get(1)?,
        name: row.get(2)?,
        reminder_time: row.get(4)?,
        is_checked: row.get::<i64>(5)? != 0,
        current_streak: column_u32(row, 6)?,
        longest_streak: column_u32(row, 7)?,
        last_checked_date,
        is_synced: row.get::<i64>(9)? != 0,
        is_deleted: row.get::<i64>(10)? != 0,
        sync_blocked: row.get::<i64>(11)? != 0,
        last_modified: row.get(12)?,
    })
}

fn column_u32(row: &Row, idx: i32) -> Result<u32> {
    let value: i64 = row.get(idx)?;
    u32::try_from(value).map_err(|_| Error::Database(format!("column {idx} out of range: {value}")))
}

fn format_date(date: Option<NaiveDate>) -> String {
    date.map(|date| date.format(DATE_FORMAT).to_string())
        .unwrap_or_default()
}

impl HabitRepository for LibSqlHabitRepository<'_> {
    async fn upsert(&self, habit: &HabitRecord) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO habits (
                    id, owner_id, name, active_days, reminder_time, is_checked,
                    current_streak, longest_streak, last_checked_date, is_synced,
                    is_deleted, sync_blocked, last_modified
                 ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(id) DO UPDATE SET
                    owner_id = excluded.owner_id,
                    name = excluded.name,
                    active_days = excluded.active_days,
                    reminder_time = excluded.reminder_time,
                    is_checked = excluded.is_checked,
                    current_streak = excluded.current_streak,
                    longest_streak = excluded.longest_streak,
                    last_checked_date = excluded.last_checked_date,
                    is_synced = excluded.is_synced,
                    is_deleted = excluded.is_deleted,
                    sync_blocked = excluded.sync_blocked,
                    last_modified = excluded.last_modified",
                params![
                    habit.id.as_str(),
                    habit.owner_id.as_str(),
                    habit.name.as_str(),
                    join_days(&habit.active_days),
                    habit.reminder_time.as_str(),
                    i64::from(habit.is_checked),
                    i64::from(habit.current_streak),
                    i64::from(habit.longest_streak),
                    format_date(habit.last_checked_date),
                    i64::from(habit.is_synced),
                    i64::from(habit.is_deleted),
                    i64::from(habit.sync_blocked),
                    habit.last_modified,
                ],
            )
            .await?;
        Ok(())
    }

    async fn get_by_id(&self, id: &HabitId) -> Result<Option<HabitRecord>> {
        self.query_one("id = ?", [id.as_str()]).await
    }

    async fn get_visible(&self, id: &HabitId) -> Result<Option<HabitRecord>> {
        self.query_one("id = ? AND is_deleted = 0", [id.as_str()])
            .await
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<HabitRecord>> {
        self.query_habits(
            "owner_id = ? AND is_deleted = 0 ORDER BY rowid ASC",
            [owner_id],
        )
        .await
    }

    async fn list_completed(&self, owner_id: &str) -> Result<Vec<HabitRecord>> {
        self.query_habits(
            "owner_id = ? AND is_deleted = 0 AND is_checked = 1 ORDER BY rowid ASC",
            [owner_id],
        )
        .await
    }

    async fn soft_delete(&self, id: &HabitId, timestamp: i64) -> Result<bool> {
        let rows = self
            .conn
            .execute(
                "UPDATE habits SET is_deleted = 1, last_modified = ? WHERE id = ? AND is_deleted = 0",
                params![timestamp, id.as_str()],
            )
            .await?;
        Ok(rows > 0)
    }

    async fn list_unsynced(&self) -> Result<Vec<HabitRecord>> {
        self.query_habits("is_synced = 0 AND is_deleted = 0 ORDER BY rowid ASC", ())
            .await
    }

    async fn mark_synced(&self, id: &HabitId) -> Result<()> {
        self.conn
            .execute(
                "UPDATE habits SET is_synced = 1 WHERE id = ?",
                [id.as_str()],
            )
            .await?;
        Ok(())
    }

    async fn mark_unsynced(&self, id: &HabitId) -> Result<()> {
        self.conn
            .execute(
                "UPDATE habits SET is_synced = 0 WHERE id = ?",
                [id.as_str()],
            )
            .await?;
        Ok(())
    }

    async fn purge(&self, id: &HabitId) -> Result<()> {
        self.conn
            .execute("DELETE FROM habits WHERE id = ?", [id.as_str()])
            .await?;
        Ok(())
    }

    async fn purge_deleted_and_synced(&self) -> Result<u64> {
        let rows = self
            .conn
            .execute(
                "DELETE FROM habits WHERE is_deleted = 1 AND is_synced = 1",
                (),
            )
            .await?;
        Ok(rows)
    }

    async fn set_sync_blocked(&self, id: &HabitId, blocked: bool) -> Result<()> {
        self.conn
            .execute(
                "UPDATE habits SET sync_blocked = ? WHERE id = ?",
                params![i64::from(blocked), id.as_str()],
            )
            .await?;
        Ok(())
    }

    async fn list_blocked(&self, owner_id: &str) -> Result<Vec<HabitRecord>> {
        self.query_habits(
            "owner_id = ? AND sync_blocked = 1 ORDER BY rowid ASC",
            [owner_id],
        )
        .await
    }
}

//! Shared habit store used by clients and the sync engine.
//!
//! Every mutation runs in one local transaction that writes the record and its
//! pending-change intent together, so a crash can never leave one without the
//! other. Observers registered through [`HabitStore::observe_records`] receive a
//! fresh snapshot of the owner's visible records after each committed mutation,
//! in commit order.

use std::path::PathBuf;
use std::sync::{Arc, PoisonError};

use chrono::NaiveDate;
use libsql::Connection;
use tokio::sync::{mpsc, Mutex};

use crate::db::{
    begin, finish, ChangeQueueRepository, Database, HabitRepository, LibSqlChangeQueueRepository,
    LibSqlHabitRepository, LibSqlMetadataRepository, MetadataRepository, LAST_SUCCESSFUL_SYNC_AT,
    LAST_SYNC_ATTEMPT_AT,
};
use crate::models::{
    normalize_reminder_time, parse_days, ChangeAction, ChangeIntent, HabitId, HabitRecord,
};
use crate::streak::apply_check_in;
use crate::sync::{merge_remote, MergeDecision, RemoteHabit};
use crate::util::{next_modified, unix_millis_now};
use crate::{Error, Result};

struct Observer {
    owner_id: String,
    tx: mpsc::UnboundedSender<Vec<HabitRecord>>,
}

/// Live view of one owner's visible records.
///
/// The first item is the snapshot at subscription time; every later item is the
/// snapshot right after a committed mutation touching that owner.
pub struct RecordsSubscription {
    owner_id: String,
    rx: mpsc::UnboundedReceiver<Vec<HabitRecord>>,
}

impl RecordsSubscription {
    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    /// Wait for the next snapshot. Returns `None` once the store is dropped.
    pub async fn next(&mut self) -> Option<Vec<HabitRecord>> {
        self.rx.recv().await
    }

    /// Take the next snapshot if one is already queued.
    pub fn try_next(&mut self) -> Option<Vec<HabitRecord>> {
        self.rx.try_recv().ok()
    }
}

/// Counts produced by folding a remote snapshot into the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub skipped: usize,
}

/// Thread-safe store for habit records and their pending changes.
#[derive(Clone)]
pub struct HabitStore {
    db: Arc<Mutex<Database>>,
    observers: Arc<std::sync::Mutex<Vec<Observer>>>,
    db_path: Option<PathBuf>,
}

impl HabitStore {
    /// Open a store at the given filesystem path.
    pub async fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::open(&db_path).await?;
        tracing::debug!("Opened habit store at {}", db_path.display());
        Ok(Self::from_database(db, Some(db_path)))
    }

    /// Open an in-memory store (primarily for tests).
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory().await?;
        Ok(Self::from_database(db, None))
    }

    fn from_database(db: Database, db_path: Option<PathBuf>) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            observers: Arc::new(std::sync::Mutex::new(Vec::new())),
            db_path,
        }
    }

    /// Path of the backing file, if any.
    pub fn db_path(&self) -> Option<&PathBuf> {
        self.db_path.as_ref()
    }

    // ------------------------------------------------------------------
    // User-facing mutations
    // ------------------------------------------------------------------

    /// Create a habit locally and queue it for upload.
    pub async fn create_record<S: AsRef<str>>(
        &self,
        owner_id: &str,
        name: &str,
        days: &[S],
        reminder_time: &str,
    ) -> Result<HabitId> {
        let owner_id = required(owner_id, "owner id")?;
        let name = required(name, "habit name")?;
        let active_days = parse_days(days)?;
        if active_days.is_empty() {
            return Err(Error::InvalidInput(
                "a habit needs at least one active day".into(),
            ));
        }
        let reminder_time = normalize_reminder_time(reminder_time)?;

        let habit = HabitRecord::new(owner_id, name, active_days, reminder_time);
        let id = habit.id.clone();

        let db = self.db.lock().await;
        let conn = db.connection();
        begin(conn).await?;
        let result = async {
            LibSqlHabitRepository::new(conn).upsert(&habit).await?;
            LibSqlChangeQueueRepository::new(conn)
                .enqueue(&ChangeIntent::pending(id.clone(), ChangeAction::Create))
                .await?;
            Ok(())
        }
        .await;
        finish(conn, result).await?;
        tracing::debug!("Habit {} saved locally and queued for upload", id);

        self.publish(conn, &habit.owner_id).await;
        Ok(id)
    }

    /// Replace a habit's name, schedule, and reminder.
    pub async fn update_record<S: AsRef<str>>(
        &self,
        id: &HabitId,
        name: &str,
        days: &[S],
        reminder_time: &str,
    ) -> Result<HabitRecord> {
        let name = required(name, "habit name")?;
        let active_days = parse_days(days)?;
        if active_days.is_empty() {
            return Err(Error::InvalidInput(
                "a habit needs at least one active day".into(),
            ));
        }
        let reminder_time = normalize_reminder_time(reminder_time)?;

        let db = self.db.lock().await;
        let conn = db.connection();
        begin(conn).await?;
        let result = async {
            let habits = LibSqlHabitRepository::new(conn);
            let mut habit = habits
                .get_visible(id)
                .await?
                .ok_or_else(|| Error::NotFound(id.to_string()))?;

            habit.name = name;
            habit.active_days = active_days;
            habit.reminder_time = reminder_time;
            habit.is_synced = false;
            habit.last_modified = next_modified(habit.last_modified);
            habits.upsert(&habit).await?;

            LibSqlChangeQueueRepository::new(conn)
                .enqueue(&ChangeIntent::pending(id.clone(), ChangeAction::Update))
                .await?;
            Ok(habit)
        }
        .await;
        let habit = finish(conn, result).await?;

        self.publish(conn, &habit.owner_id).await;
        Ok(habit)
    }

    /// Mark today's occurrence complete or not complete.
    pub async fn set_checked(&self, id: &HabitId, checked: bool) -> Result<HabitRecord> {
        self.set_checked_on(id, checked, chrono::Local::now().date_naive())
            .await
    }

    /// Mark the occurrence on `today` complete or not complete.
    ///
    /// Streaks are recomputed only on a transition to checked. A habit left
    /// checked from an earlier day counts as unchecked for `today`. Un-checking
    /// never lowers the streak.
    pub async fn set_checked_on(
        &self,
        id: &HabitId,
        checked: bool,
        today: NaiveDate,
    ) -> Result<HabitRecord> {
        let db = self.db.lock().await;
        let conn = db.connection();
        begin(conn).await?;
        let result = async {
            let habits = LibSqlHabitRepository::new(conn);
            let mut habit = habits
                .get_visible(id)
                .await?
                .ok_or_else(|| Error::NotFound(id.to_string()))?;

            let checked_today = habit.is_checked && habit.last_checked_date == Some(today);
            if checked == checked_today && checked == habit.is_checked {
                return Ok((habit, false));
            }

            if checked && !checked_today {
                let update = apply_check_in(
                    habit.current_streak,
                    habit.longest_streak,
                    habit.last_checked_date,
                    today,
                );
                habit.current_streak = update.current_streak;
                habit.longest_streak = update.longest_streak;
                habit.last_checked_date = Some(update.last_checked_date);
            }

            habit.is_checked = checked;
            habit.is_synced = false;
            habit.last_modified = next_modified(habit.last_modified);
            habits.upsert(&habit).await?;

            LibSqlChangeQueueRepository::new(conn)
                .enqueue(&ChangeIntent::pending(id.clone(), ChangeAction::Update))
                .await?;
            Ok((habit, true))
        }
        .await;
        let (habit, changed) = finish(conn, result).await?;

        if changed {
            tracing::debug!(
                "Habit {} checked={} streak={}",
                habit.id,
                habit.is_checked,
                habit.current_streak
            );
            self.publish(conn, &habit.owner_id).await;
        }
        Ok(habit)
    }

    /// Soft-delete a habit and queue the delete for transmission.
    pub async fn delete_record(&self, id: &HabitId) -> Result<()> {
        let db = self.db.lock().await;
        let conn = db.connection();
        begin(conn).await?;
        let result = async {
            let habits = LibSqlHabitRepository::new(conn);
            let habit = habits
                .get_visible(id)
                .await?
                .ok_or_else(|| Error::NotFound(id.to_string()))?;

            habits
                .soft_delete(id, next_modified(habit.last_modified))
                .await?;
            // The server still knows this row until the delete is confirmed.
            habits.mark_unsynced(id).await?;
            LibSqlChangeQueueRepository::new(conn)
                .enqueue(&ChangeIntent::pending(id.clone(), ChangeAction::Delete))
                .await?;
            Ok(habit.owner_id)
        }
        .await;
        let owner_id = finish(conn, result).await?;

        self.publish(conn, &owner_id).await;
        Ok(())
    }

    /// Clear a habit's quarantine marker and reset its retry counters.
    pub async fn unblock_record(&self, id: &HabitId) -> Result<()> {
        let db = self.db.lock().await;
        let conn = db.connection();
        begin(conn).await?;
        let result = async {
            let habits = LibSqlHabitRepository::new(conn);
            let habit = habits
                .get_by_id(id)
                .await?
                .ok_or_else(|| Error::NotFound(id.to_string()))?;
            habits.set_sync_blocked(id, false).await?;
            LibSqlChangeQueueRepository::new(conn)
                .reset_retries(id)
                .await?;
            Ok(habit.owner_id)
        }
        .await;
        let owner_id = finish(conn, result).await?;

        self.publish(conn, &owner_id).await;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Fetch a visible habit by id.
    pub async fn get_visible(&self, id: &HabitId) -> Result<Option<HabitRecord>> {
        let db = self.db.lock().await;
        LibSqlHabitRepository::new(db.connection())
            .get_visible(id)
            .await
    }

    /// Fetch a habit by id, including soft-deleted rows.
    pub async fn get_by_id(&self, id: &HabitId) -> Result<Option<HabitRecord>> {
        let db = self.db.lock().await;
        LibSqlHabitRepository::new(db.connection())
            .get_by_id(id)
            .await
    }

    /// Current visible habits for an owner.
    pub async fn list_records(&self, owner_id: &str) -> Result<Vec<HabitRecord>> {
        let db = self.db.lock().await;
        LibSqlHabitRepository::new(db.connection())
            .list_by_owner(owner_id)
            .await
    }

    /// Visible habits for an owner that are checked.
    pub async fn list_completed(&self, owner_id: &str) -> Result<Vec<HabitRecord>> {
        let db = self.db.lock().await;
        LibSqlHabitRepository::new(db.connection())
            .list_completed(owner_id)
            .await
    }

    /// Habits with local changes the server has not acknowledged.
    pub async fn list_unsynced(&self) -> Result<Vec<HabitRecord>> {
        let db = self.db.lock().await;
        LibSqlHabitRepository::new(db.connection())
            .list_unsynced()
            .await
    }

    /// Habits whose pending changes hit the retry cap.
    pub async fn list_blocked(&self, owner_id: &str) -> Result<Vec<HabitRecord>> {
        let db = self.db.lock().await;
        LibSqlHabitRepository::new(db.connection())
            .list_blocked(owner_id)
            .await
    }

    /// Queued change intents, oldest first.
    pub async fn pending_changes(&self) -> Result<Vec<ChangeIntent>> {
        let db = self.db.lock().await;
        LibSqlChangeQueueRepository::new(db.connection())
            .drain()
            .await
    }

    /// Number of queued change intents.
    pub async fn pending_count(&self) -> Result<u64> {
        let db = self.db.lock().await;
        LibSqlChangeQueueRepository::new(db.connection())
            .count()
            .await
    }

    /// Last time a full sync pass completed, in Unix ms.
    pub async fn last_successful_sync_at(&self) -> Result<Option<i64>> {
        let db = self.db.lock().await;
        LibSqlMetadataRepository::new(db.connection())
            .get_timestamp(LAST_SUCCESSFUL_SYNC_AT)
            .await
    }

    /// Last time a sync pass started, in Unix ms.
    pub async fn last_sync_attempt_at(&self) -> Result<Option<i64>> {
        let db = self.db.lock().await;
        LibSqlMetadataRepository::new(db.connection())
            .get_timestamp(LAST_SYNC_ATTEMPT_AT)
            .await
    }

    /// Subscribe to the live list of an owner's visible habits.
    pub async fn observe_records(&self, owner_id: &str) -> Result<RecordsSubscription> {
        let db = self.db.lock().await;
        let snapshot = LibSqlHabitRepository::new(db.connection())
            .list_by_owner(owner_id)
            .await?;

        let (tx, rx) = mpsc::unbounded_channel();
        // Registered while the database lock is held so no commit slips between
        // the initial snapshot and the first notification.
        tx.send(snapshot)
            .map_err(|_| Error::Database("observer channel closed".into()))?;
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Observer {
                owner_id: owner_id.to_string(),
                tx,
            });

        Ok(RecordsSubscription {
            owner_id: owner_id.to_string(),
            rx,
        })
    }

    // ------------------------------------------------------------------
    // Entity-store primitives used by the sync engine
    // ------------------------------------------------------------------

    /// Insert or fully replace a record by id.
    pub async fn upsert(&self, habit: &HabitRecord) -> Result<()> {
        let db = self.db.lock().await;
        let conn = db.connection();
        LibSqlHabitRepository::new(conn).upsert(habit).await?;
        self.publish(conn, &habit.owner_id).await;
        Ok(())
    }

    /// Set `is_synced` on a record without touching other fields.
    pub async fn mark_synced(&self, id: &HabitId) -> Result<()> {
        let db = self.db.lock().await;
        let conn = db.connection();
        let habits = LibSqlHabitRepository::new(conn);
        habits.mark_synced(id).await?;
        if let Some(habit) = habits.get_by_id(id).await? {
            self.publish(conn, &habit.owner_id).await;
        }
        Ok(())
    }

    /// Physically remove rows that are deleted and acknowledged.
    pub async fn purge_deleted_and_synced(&self) -> Result<u64> {
        let db = self.db.lock().await;
        LibSqlHabitRepository::new(db.connection())
            .purge_deleted_and_synced()
            .await
    }

    /// Record a confirmed upload of everything queued up to `through_queue_id`.
    ///
    /// The record is marked synced only when no newer intent arrived while the
    /// upload was in flight. Returns whether the record is now synced.
    pub async fn complete_transmission(
        &self,
        id: &HabitId,
        through_queue_id: i64,
    ) -> Result<bool> {
        let db = self.db.lock().await;
        let conn = db.connection();
        begin(conn).await?;
        let result = async {
            let queue = LibSqlChangeQueueRepository::new(conn);
            queue.clear_for_habit_through(id, through_queue_id).await?;
            if queue.count_for_habit(id).await? > 0 {
                return Ok((false, None));
            }

            let habits = LibSqlHabitRepository::new(conn);
            habits.mark_synced(id).await?;
            Ok((true, habits.get_by_id(id).await?.map(|habit| habit.owner_id)))
        }
        .await;
        let (synced, owner_id) = finish(conn, result).await?;

        if let Some(owner_id) = owner_id {
            self.publish(conn, &owner_id).await;
        }
        Ok(synced)
    }

    /// Record a confirmed remote delete: drop the row and its queue entries.
    pub async fn complete_delete(&self, id: &HabitId) -> Result<()> {
        let db = self.db.lock().await;
        let conn = db.connection();
        begin(conn).await?;
        let result = async {
            let habits = LibSqlHabitRepository::new(conn);
            let owner_id = habits.get_by_id(id).await?.map(|habit| habit.owner_id);
            habits.purge(id).await?;
            LibSqlChangeQueueRepository::new(conn)
                .clear_for_habit(id)
                .await?;
            Ok(owner_id)
        }
        .await;
        let owner_id = finish(conn, result).await?;

        if let Some(owner_id) = owner_id {
            self.publish(conn, &owner_id).await;
        }
        Ok(())
    }

    /// Drop queue entries for a record without transmitting them.
    pub async fn abandon_changes(&self, id: &HabitId) -> Result<u64> {
        let db = self.db.lock().await;
        LibSqlChangeQueueRepository::new(db.connection())
            .clear_for_habit(id)
            .await
    }

    /// Bump retry counts after a failed transmission, quarantining the record
    /// when `block` is set.
    pub async fn record_transmission_failure(
        &self,
        id: &HabitId,
        queue_ids: &[i64],
        block: bool,
    ) -> Result<()> {
        let db = self.db.lock().await;
        let conn = db.connection();
        begin(conn).await?;
        let result = async {
            let queue = LibSqlChangeQueueRepository::new(conn);
            for queue_id in queue_ids {
                queue.bump_retry(*queue_id).await?;
            }

            if !block {
                return Ok(None);
            }
            let habits = LibSqlHabitRepository::new(conn);
            habits.set_sync_blocked(id, true).await?;
            Ok(habits.get_by_id(id).await?.map(|habit| habit.owner_id))
        }
        .await;
        let owner_id = finish(conn, result).await?;

        if let Some(owner_id) = owner_id {
            self.publish(conn, &owner_id).await;
        }
        Ok(())
    }

    /// Fold a remote snapshot for `owner_id` into the store in one transaction.
    pub async fn reconcile_remote(
        &self,
        owner_id: &str,
        remote: &[RemoteHabit],
    ) -> Result<ReconcileStats> {
        let db = self.db.lock().await;
        let conn = db.connection();
        begin(conn).await?;
        let result = async {
            let habits = LibSqlHabitRepository::new(conn);
            let mut stats = ReconcileStats::default();
            let now = unix_millis_now();

            for remote_habit in remote {
                let local = match remote_habit.habit_id() {
                    Some(id) => habits.get_by_id(&id).await?,
                    None => None,
                };

                match merge_remote(local.as_ref(), remote_habit, owner_id, now) {
                    MergeDecision::Insert(habit) => {
                        habits.upsert(&habit).await?;
                        stats.inserted += 1;
                    }
                    MergeDecision::Update(habit) => {
                        habits.upsert(&habit).await?;
                        stats.updated += 1;
                    }
                    MergeDecision::Unchanged => stats.unchanged += 1,
                    MergeDecision::Skip(reason) => {
                        tracing::warn!("Skipping remote habit {:?}: {}", remote_habit.id, reason);
                        stats.skipped += 1;
                    }
                }
            }
            Ok(stats)
        }
        .await;
        let stats = finish(conn, result).await?;

        if stats.inserted + stats.updated > 0 {
            self.publish(conn, owner_id).await;
        }
        Ok(stats)
    }

    /// Store a sync diagnostics timestamp.
    pub async fn record_sync_timestamp(&self, key: &str, timestamp: i64) -> Result<()> {
        let db = self.db.lock().await;
        LibSqlMetadataRepository::new(db.connection())
            .set_timestamp(key, timestamp)
            .await
    }

    /// Push the owner's current snapshot to its observers.
    ///
    /// Called with the database lock held, right after a commit, so observers
    /// see commits in order and exactly once.
    async fn publish(&self, conn: &Connection, owner_id: &str) {
        let has_observers = {
            let mut observers = self
                .observers
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            observers.retain(|observer| !observer.tx.is_closed());
            observers
                .iter()
                .any(|observer| observer.owner_id == owner_id)
        };
        if !has_observers {
            return;
        }

        let snapshot = match LibSqlHabitRepository::new(conn)
            .list_by_owner(owner_id)
            .await
        {
            Ok(snapshot) => snapshot,
            Err(error) => {
                tracing::warn!("Failed to load snapshot for observers of {owner_id}: {error}");
                return;
            }
        };

        let observers = self
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for observer in observers.iter().filter(|o| o.owner_id == owner_id) {
            observer.tx.send(snapshot.clone()).ok();
        }
    }
}

fn required(value: &str, field: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        Err(Error::InvalidInput(format!("{field} cannot be empty")))
    } else {
        Ok(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn day(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    async fn store_with_habit() -> (HabitStore, HabitId) {
        let store = HabitStore::open_in_memory().await.unwrap();
        let id = store
            .create_record("u1", "Read", &["Monday", "Friday"], "08:00")
            .await
            .unwrap();
        (store, id)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn create_is_local_first_and_queued() {
        let (store, id) = store_with_habit().await;

        let unsynced = store.list_unsynced().await.unwrap();
        assert_eq!(unsynced.len(), 1);
        assert_eq!(unsynced[0].id, id);

        let pending = store.pending_changes().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].action, ChangeAction::Create);
        assert_eq!(pending[0].habit_id, id);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn create_rejects_invalid_input() {
        let store = HabitStore::open_in_memory().await.unwrap();

        let blank = store.create_record("u1", "  ", &["Monday"], "08:00").await;
        assert!(matches!(blank, Err(Error::InvalidInput(_))));

        let no_days = store
            .create_record::<&str>("u1", "Read", &[], "08:00")
            .await;
        assert!(matches!(no_days, Err(Error::InvalidInput(_))));

        let bad_time = store.create_record("u1", "Read", &["Monday"], "8pm").await;
        assert!(matches!(bad_time, Err(Error::InvalidInput(_))));

        assert_eq!(store.pending_count().await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn update_replaces_fields_and_queues_update() {
        let (store, id) = store_with_habit().await;

        let updated = store
            .update_record(&id, "Read 30 min", &["Sunday"], "21:15")
            .await
            .unwrap();
        assert_eq!(updated.name, "Read 30 min");
        assert_eq!(updated.reminder_time, "21:15");
        assert_eq!(updated.active_days.len(), 1);

        let actions = store
            .pending_changes()
            .await
            .unwrap()
            .into_iter()
            .map(|intent| intent.action)
            .collect::<Vec<_>>();
        assert_eq!(actions, vec![ChangeAction::Create, ChangeAction::Update]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn check_in_twice_same_day_is_idempotent() {
        let (store, id) = store_with_habit().await;
        let today = day("2024-06-10");

        let first = store.set_checked_on(&id, true, today).await.unwrap();
        assert_eq!(first.current_streak, 1);
        let pending_after_first = store.pending_count().await.unwrap();

        let second = store.set_checked_on(&id, true, today).await.unwrap();
        assert_eq!(second.current_streak, 1);
        assert_eq!(second.longest_streak, 1);
        assert_eq!(store.pending_count().await.unwrap(), pending_after_first);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn check_in_continues_streak_from_yesterday() {
        let (store, id) = store_with_habit().await;

        let mut habit = store.get_visible(&id).await.unwrap().unwrap();
        habit.current_streak = 3;
        habit.longest_streak = 3;
        habit.last_checked_date = Some(day("2024-06-09"));
        store.upsert(&habit).await.unwrap();

        let checked = store
            .set_checked_on(&id, true, day("2024-06-10"))
            .await
            .unwrap();
        assert_eq!(checked.current_streak, 4);
        assert_eq!(checked.longest_streak, 4);
        assert_eq!(checked.last_checked_date, Some(day("2024-06-10")));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn check_in_after_gap_resets_streak() {
        let (store, id) = store_with_habit().await;

        let mut habit = store.get_visible(&id).await.unwrap().unwrap();
        habit.current_streak = 6;
        habit.longest_streak = 9;
        habit.last_checked_date = Some(day("2024-06-07"));
        store.upsert(&habit).await.unwrap();

        let checked = store
            .set_checked_on(&id, true, day("2024-06-10"))
            .await
            .unwrap();
        assert_eq!(checked.current_streak, 1);
        assert_eq!(checked.longest_streak, 9);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn uncheck_keeps_streak_and_recheck_does_not_double_count() {
        let (store, id) = store_with_habit().await;
        let today = day("2024-06-10");

        store.set_checked_on(&id, true, today).await.unwrap();
        let unchecked = store.set_checked_on(&id, false, today).await.unwrap();
        assert!(!unchecked.is_checked);
        assert_eq!(unchecked.current_streak, 1);

        let rechecked = store.set_checked_on(&id, true, today).await.unwrap();
        assert!(rechecked.is_checked);
        assert_eq!(rechecked.current_streak, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn stale_check_from_yesterday_counts_as_new_day() {
        let (store, id) = store_with_habit().await;

        store
            .set_checked_on(&id, true, day("2024-06-09"))
            .await
            .unwrap();
        let next_day = store
            .set_checked_on(&id, true, day("2024-06-10"))
            .await
            .unwrap();
        assert_eq!(next_day.current_streak, 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn delete_hides_record_but_keeps_row() {
        let (store, id) = store_with_habit().await;

        store.delete_record(&id).await.unwrap();

        assert!(store.list_records("u1").await.unwrap().is_empty());
        assert!(store.get_visible(&id).await.unwrap().is_none());
        let raw = store.get_by_id(&id).await.unwrap().unwrap();
        assert!(raw.is_deleted);
        assert!(!raw.is_synced);

        // Deleted but unacknowledged rows survive the cleanup sweep.
        assert_eq!(store.purge_deleted_and_synced().await.unwrap(), 0);
        assert!(store.get_by_id(&id).await.unwrap().is_some());

        assert!(matches!(
            store.delete_record(&id).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn last_modified_advances_on_every_mutation() {
        let (store, id) = store_with_habit().await;

        // A marker ahead of the wall clock, as after the clock steps back.
        let mut habit = store.get_by_id(&id).await.unwrap().unwrap();
        let ahead = unix_millis_now() + 3_600_000;
        habit.last_modified = ahead;
        store.upsert(&habit).await.unwrap();

        let edited = store
            .update_record(&id, "Read", &["Monday"], "08:00")
            .await
            .unwrap();
        assert_eq!(edited.last_modified, ahead + 1);

        let checked = store
            .set_checked_on(&id, true, day("2024-06-10"))
            .await
            .unwrap();
        assert_eq!(checked.last_modified, ahead + 2);

        let unchecked = store.set_checked_on(&id, false, day("2024-06-10")).await.unwrap();
        assert_eq!(unchecked.last_modified, ahead + 3);

        store.delete_record(&id).await.unwrap();
        let deleted = store.get_by_id(&id).await.unwrap().unwrap();
        assert_eq!(deleted.last_modified, ahead + 4);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn complete_transmission_keeps_newer_intents() {
        let (store, id) = store_with_habit().await;
        let observed = store.pending_changes().await.unwrap();
        let through = observed.last().unwrap().queue_id;

        // A mutation lands while the upload is in flight.
        store
            .set_checked_on(&id, true, day("2024-06-10"))
            .await
            .unwrap();

        assert!(!store.complete_transmission(&id, through).await.unwrap());
        let habit = store.get_by_id(&id).await.unwrap().unwrap();
        assert!(!habit.is_synced);
        assert_eq!(store.pending_count().await.unwrap(), 1);

        let through = store.pending_changes().await.unwrap()[0].queue_id;
        assert!(store.complete_transmission(&id, through).await.unwrap());
        assert!(store.get_by_id(&id).await.unwrap().unwrap().is_synced);
        assert_eq!(store.pending_count().await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failure_with_block_quarantines_and_unblock_resets() {
        let (store, id) = store_with_habit().await;
        let queue_ids = store
            .pending_changes()
            .await
            .unwrap()
            .iter()
            .map(|intent| intent.queue_id)
            .collect::<Vec<_>>();

        store
            .record_transmission_failure(&id, &queue_ids, false)
            .await
            .unwrap();
        assert!(store.list_blocked("u1").await.unwrap().is_empty());

        store
            .record_transmission_failure(&id, &queue_ids, true)
            .await
            .unwrap();
        assert_eq!(store.list_blocked("u1").await.unwrap().len(), 1);
        assert_eq!(store.pending_changes().await.unwrap()[0].retry_count, 2);

        store.unblock_record(&id).await.unwrap();
        assert!(store.list_blocked("u1").await.unwrap().is_empty());
        assert_eq!(store.pending_changes().await.unwrap()[0].retry_count, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn observers_see_each_commit_in_order() {
        let store = HabitStore::open_in_memory().await.unwrap();
        let mut subscription = store.observe_records("u1").await.unwrap();
        let mut other_owner = store.observe_records("u2").await.unwrap();

        assert!(subscription.next().await.unwrap().is_empty());
        assert!(other_owner.next().await.unwrap().is_empty());

        let id = store
            .create_record("u1", "Meditate", &["Tuesday"], "06:45")
            .await
            .unwrap();
        store
            .set_checked_on(&id, true, day("2024-06-10"))
            .await
            .unwrap();
        store.delete_record(&id).await.unwrap();

        let after_create = subscription.next().await.unwrap();
        assert_eq!(after_create.len(), 1);
        assert!(!after_create[0].is_checked);

        let after_check = subscription.next().await.unwrap();
        assert!(after_check[0].is_checked);

        let after_delete = subscription.next().await.unwrap();
        assert!(after_delete.is_empty());

        assert!(subscription.try_next().is_none());
        assert!(other_owner.try_next().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn store_persists_across_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("habits.db");

        let id = {
            let store = HabitStore::open_path(&path).await.unwrap();
            store
                .create_record("u1", "Journal", &["Sat"], "22:00")
                .await
                .unwrap()
        };

        let reopened = HabitStore::open_path(&path).await.unwrap();
        assert!(reopened.get_visible(&id).await.unwrap().is_some());
        assert_eq!(reopened.pending_count().await.unwrap(), 1);
    }
}

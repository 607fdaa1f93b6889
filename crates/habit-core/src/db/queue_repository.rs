//! Pending-change queue repository implementation

use libsql::{params, Connection, Row};

use crate::error::{Error, Result};
use crate::models::{ChangeIntent, HabitId};

/// Trait for pending-change queue operations (async)
#[allow(async_fn_in_trait)]
pub trait ChangeQueueRepository {
    /// Append an intent; returns the assigned queue id
    async fn enqueue(&self, intent: &ChangeIntent) -> Result<i64>;

    /// All queued intents, oldest first. Does not remove anything.
    async fn drain(&self) -> Result<Vec<ChangeIntent>>;

    /// Delete one specific entry
    async fn remove(&self, intent: &ChangeIntent) -> Result<()>;

    /// Increment an entry's retry count
    async fn bump_retry(&self, queue_id: i64) -> Result<()>;

    /// Remove every entry for a record
    async fn clear_for_habit(&self, habit_id: &HabitId) -> Result<u64>;

    /// Remove entries for a record up to and including `max_queue_id`
    async fn clear_for_habit_through(&self, habit_id: &HabitId, max_queue_id: i64) -> Result<u64>;

    /// Number of entries still queued for a record
    async fn count_for_habit(&self, habit_id: &HabitId) -> Result<u64>;

    /// Total number of queued entries
    async fn count(&self) -> Result<u64>;

    /// Reset retry counts for a record's entries
    async fn reset_retries(&self, habit_id: &HabitId) -> Result<()>;
}

/// libSQL implementation of `ChangeQueueRepository`
pub struct LibSqlChangeQueueRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlChangeQueueRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    async fn count_where(
        &self,
        where_clause: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM sync_queue WHERE {where_clause}");
        let mut rows = self.conn.query(&sql, params).await?;
        let count: i64 = match rows.next().await? {
            Some(row) => row.get(0)?,
            None => 0,
        };
        Ok(u64::try_from(count).unwrap_or_default())
    }
}

fn parse_intent(row: &Row) -> Result<ChangeIntent> {
    let habit_id: String = row.get(1)?;
    let action: String = row.get(2)?;
    let retry_count: i64 = row.get(4)?;

    Ok(ChangeIntent {
        queue_id: row.get(0)?,
        habit_id: habit_id.parse()?,
        action: action.parse()?,
        enqueued_at: row.get(3)?,
        retry_count: u32::try_from(retry_count)
            .map_err(|_| Error::Database(format!("retry_count out of range: {retry_count}")))?,
    })
}

impl ChangeQueueRepository for LibSqlChangeQueueRepository<'_> {
    async fn enqueue(&self, intent: &ChangeIntent) -> Result<i64> {
        self.conn
            .execute(
                "INSERT INTO sync_queue (habit_id, action, enqueued_at, retry_count) VALUES (?, ?, ?, ?)",
                params![
                    intent.habit_id.as_str(),
                    intent.action.as_str(),
                    intent.enqueued_at,
                    i64::from(intent.retry_count),
                ],
            )
            .await?;
        Ok(self.conn.last_insert_rowid())
    }

    async fn drain(&self) -> Result<Vec<ChangeIntent>> {
        let mut rows = self
            .conn
            .query(
                "SELECT queue_id, habit_id, action, enqueued_at, retry_count
                 FROM sync_queue
                 ORDER BY queue_id ASC",
                (),
            )
            .await?;

        let mut intents = Vec::new();
        while let Some(row) = rows.next().await? {
            intents.push(parse_intent(&row)?);
        }
        Ok(intents)
    }

    async fn remove(&self, intent: &ChangeIntent) -> Result<()> {
        self.conn
            .execute(
                "DELETE FROM sync_queue WHERE queue_id = ?",
                [intent.queue_id],
            )
            .await?;
        Ok(())
    }

    async fn bump_retry(&self, queue_id: i64) -> Result<()> {
        self.conn
            .execute(
                "UPDATE sync_queue SET retry_count = retry_count + 1 WHERE queue_id = ?",
                [queue_id],
            )
            .await?;
        Ok(())
    }

    async fn clear_for_habit(&self, habit_id: &HabitId) -> Result<u64> {
        let rows = self
            .conn
            .execute(
                "DELETE FROM sync_queue WHERE habit_id = ?",
                [habit_id.as_str()],
            )
            .await?;
        Ok(rows)
    }

    async fn clear_for_habit_through(&self, habit_id: &HabitId, max_queue_id: i64) -> Result<u64> {
        let rows = self
            .conn
            .execute(
                "DELETE FROM sync_queue WHERE habit_id = ? AND queue_id <= ?",
                params![habit_id.as_str(), max_queue_id],
            )
            .await?;
        Ok(rows)
    }

    async fn count_for_habit(&self, habit_id: &HabitId) -> Result<u64> {
        self.count_where("habit_id = ?", [habit_id.as_str()]).await
    }

    async fn count(&self) -> Result<u64> {
        self.count_where("1 = 1", ()).await
    }

    async fn reset_retries(&self, habit_id: &HabitId) -> Result<()> {
        self.conn
            .execute(
                "UPDATE sync_queue SET retry_count = 0 WHERE habit_id = ?",
                [habit_id.as_str()],
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::ChangeAction;

    async fn setup() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_enqueue_assigns_increasing_ids() {
        let db = setup().await;
        let repo = LibSqlChangeQueueRepository::new(db.connection());
        let habit_id = HabitId::new();

        let first = repo
            .enqueue(&ChangeIntent::pending(habit_id.clone(), ChangeAction::Create))
            .await
            .unwrap();
        let second = repo
            .enqueue(&ChangeIntent::pending(habit_id, ChangeAction::Update))
            .await
            .unwrap();
        assert!(second > first);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_drain_is_ordered_and_non_destructive() {
        let db = setup().await;
        let repo = LibSqlChangeQueueRepository::new(db.connection());
        let a = HabitId::new();
        let b = HabitId::new();

        repo.enqueue(&ChangeIntent::pending(a.clone(), ChangeAction::Create))
            .await
            .unwrap();
        repo.enqueue(&ChangeIntent::pending(b.clone(), ChangeAction::Create))
            .await
            .unwrap();
        repo.enqueue(&ChangeIntent::pending(a.clone(), ChangeAction::Delete))
            .await
            .unwrap();

        let drained = repo.drain().await.unwrap();
        let order = drained
            .iter()
            .map(|intent| (intent.habit_id.clone(), intent.action))
            .collect::<Vec<_>>();
        assert_eq!(
            order,
            vec![
                (a.clone(), ChangeAction::Create),
                (b, ChangeAction::Create),
                (a, ChangeAction::Delete),
            ]
        );
        assert_eq!(repo.drain().await.unwrap().len(), 3);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_remove_and_bump_retry() {
        let db = setup().await;
        let repo = LibSqlChangeQueueRepository::new(db.connection());
        let habit_id = HabitId::new();

        repo.enqueue(&ChangeIntent::pending(habit_id.clone(), ChangeAction::Create))
            .await
            .unwrap();
        repo.enqueue(&ChangeIntent::pending(habit_id, ChangeAction::Update))
            .await
            .unwrap();

        let drained = repo.drain().await.unwrap();
        repo.bump_retry(drained[1].queue_id).await.unwrap();
        repo.bump_retry(drained[1].queue_id).await.unwrap();
        repo.remove(&drained[0]).await.unwrap();

        let remaining = repo.drain().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].queue_id, drained[1].queue_id);
        assert_eq!(remaining[0].retry_count, 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_clear_for_habit_through_keeps_newer_entries() {
        let db = setup().await;
        let repo = LibSqlChangeQueueRepository::new(db.connection());
        let habit_id = HabitId::new();
        let other = HabitId::new();

        let first = repo
            .enqueue(&ChangeIntent::pending(habit_id.clone(), ChangeAction::Create))
            .await
            .unwrap();
        repo.enqueue(&ChangeIntent::pending(other.clone(), ChangeAction::Create))
            .await
            .unwrap();
        repo.enqueue(&ChangeIntent::pending(habit_id.clone(), ChangeAction::Update))
            .await
            .unwrap();

        assert_eq!(repo.clear_for_habit_through(&habit_id, first).await.unwrap(), 1);
        assert_eq!(repo.count_for_habit(&habit_id).await.unwrap(), 1);
        assert_eq!(repo.count_for_habit(&other).await.unwrap(), 1);

        assert_eq!(repo.clear_for_habit(&habit_id).await.unwrap(), 1);
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_reset_retries() {
        let db = setup().await;
        let repo = LibSqlChangeQueueRepository::new(db.connection());
        let habit_id = HabitId::new();

        let queue_id = repo
            .enqueue(&ChangeIntent::pending(habit_id.clone(), ChangeAction::Update))
            .await
            .unwrap();
        repo.bump_retry(queue_id).await.unwrap();
        repo.reset_retries(&habit_id).await.unwrap();

        assert_eq!(repo.drain().await.unwrap()[0].retry_count, 0);
    }
}

//! Database migrations

use crate::error::Result;
use libsql::Connection;

/// Current schema version
const CURRENT_VERSION: i32 = 2;

/// Run all pending migrations
pub async fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn).await?;

    if version < 1 {
        migrate_v1(conn).await?;
    }
    if version < 2 {
        migrate_v2(conn).await?;
    }

    Ok(())
}

/// Get the current schema version
async fn get_version(conn: &Connection) -> Result<i32> {
    // Check if schema_version table exists
    let mut rows = conn
        .query(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
            (),
        )
        .await?;

    let exists: bool = if let Some(row) = rows.next().await? {
        row.get::<i32>(0)? != 0
    } else {
        false
    };

    if !exists {
        return Ok(0);
    }

    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM schema_version", ())
        .await?;

    let version: i32 = if let Some(row) = rows.next().await? {
        row.get(0)?
    } else {
        0
    };

    Ok(version)
}

/// Execute migration statements in one transaction.
async fn apply(conn: &Connection, version: i32, statements: &[&str]) -> Result<()> {
    conn.execute("BEGIN TRANSACTION", ()).await?;

    for stmt in statements {
        if let Err(e) = conn.execute(stmt, ()).await {
            conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }
    }

    if let Err(e) = conn
        .execute("INSERT INTO schema_version (version) VALUES (?)", [version])
        .await
    {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(e.into());
    }

    if let Err(e) = conn.execute("COMMIT", ()).await {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(e.into());
    }

    tracing::info!("Migrated database to version {version}");
    Ok(())
}

/// Migration to version 1: records, pending-change log, sync metadata
async fn migrate_v1(conn: &Connection) -> Result<()> {
    apply(
        conn,
        1,
        &[
            // Schema version tracking
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            )",
            // Habit records
            "CREATE TABLE IF NOT EXISTS habits (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                name TEXT NOT NULL,
                active_days TEXT NOT NULL DEFAULT '',
                reminder_time TEXT NOT NULL,
                is_checked INTEGER NOT NULL DEFAULT 0,
                current_streak INTEGER NOT NULL DEFAULT 0,
                longest_streak INTEGER NOT NULL DEFAULT 0,
                last_checked_date TEXT NOT NULL DEFAULT '',
                is_synced INTEGER NOT NULL DEFAULT 0,
                is_deleted INTEGER NOT NULL DEFAULT 0,
                last_modified INTEGER NOT NULL,
                CHECK (longest_streak >= current_streak)
            )",
            "CREATE INDEX IF NOT EXISTS idx_habits_owner ON habits(owner_id, is_deleted)",
            "CREATE INDEX IF NOT EXISTS idx_habits_unsynced ON habits(is_synced, is_deleted)",
            // Pending-change log
            "CREATE TABLE IF NOT EXISTS sync_queue (
                queue_id INTEGER PRIMARY KEY AUTOINCREMENT,
                habit_id TEXT NOT NULL,
                action TEXT NOT NULL CHECK (action IN ('CREATE', 'UPDATE', 'DELETE')),
                enqueued_at INTEGER NOT NULL,
                retry_count INTEGER NOT NULL DEFAULT 0
            )",
            "CREATE INDEX IF NOT EXISTS idx_sync_queue_habit ON sync_queue(habit_id)",
            // Diagnostics key-value area
            "CREATE TABLE IF NOT EXISTS sync_metadata (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
        ],
    )
    .await
}

/// Migration to version 2: quarantine for records that keep failing to sync
async fn migrate_v2(conn: &Connection) -> Result<()> {
    apply(
        conn,
        CURRENT_VERSION,
        &[
            "ALTER TABLE habits ADD COLUMN sync_blocked INTEGER NOT NULL DEFAULT 0",
            "CREATE INDEX IF NOT EXISTS idx_habits_blocked ON habits(owner_id, sync_blocked)",
        ],
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use libsql::Builder;

    async fn setup() -> Connection {
        let db = Builder::new_local(":memory:").build().await.unwrap();
        db.connect().unwrap()
    }

    async fn table_exists(conn: &Connection, name: &str) -> bool {
        let mut rows = conn
            .query(
                "SELECT EXISTS(
                    SELECT 1 FROM sqlite_master
                    WHERE type = 'table' AND name = ?
                )",
                [name],
            )
            .await
            .unwrap();

        rows.next()
            .await
            .unwrap()
            .is_some_and(|row| row.get::<i32>(0).unwrap() != 0)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_migrations() {
        let conn = setup().await;
        run(&conn).await.unwrap();

        let version = get_version(&conn).await.unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_migrations_idempotent() {
        let conn = setup().await;
        run(&conn).await.unwrap();
        run(&conn).await.unwrap(); // Should not fail

        let version = get_version(&conn).await.unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_migration_creates_tables() {
        let conn = setup().await;
        run(&conn).await.unwrap();

        for table in ["habits", "sync_queue", "sync_metadata"] {
            assert!(table_exists(&conn, table).await, "missing table {table}");
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_streak_check_constraint() {
        let conn = setup().await;
        run(&conn).await.unwrap();

        let result = conn
            .execute(
                "INSERT INTO habits (id, owner_id, name, reminder_time, current_streak, longest_streak, last_modified)
                 VALUES ('h1', 'u1', 'Read', '08:00', 5, 2, 0)",
                (),
            )
            .await;
        assert!(result.is_err());
    }
}

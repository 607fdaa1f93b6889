//! Database connection management

use crate::error::Result;
use libsql::{Builder, Connection, Database as LibSqlDatabase};
use std::path::Path;

use super::migrations;

/// Database wrapper for a local libSQL connection
pub struct Database {
    // Keeps the underlying database alive for as long as the connection is used.
    _db: LibSqlDatabase,
    conn: Connection,
}

impl Database {
    /// Open a local database at the given path, creating it if it doesn't exist
    ///
    /// Runs migrations automatically.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        let db = Builder::new_local(&path_str).build().await?;
        Self::from_libsql(db).await
    }

    /// Open an in-memory database (useful for testing)
    pub async fn open_in_memory() -> Result<Self> {
        let db = Builder::new_local(":memory:").build().await?;
        Self::from_libsql(db).await
    }

    async fn from_libsql(db: LibSqlDatabase) -> Result<Self> {
        let conn = db.connect()?;
        let database = Self { _db: db, conn };
        database.configure().await?;
        database.migrate().await?;
        Ok(database)
    }

    /// Configure `SQLite` for durable local writes
    async fn configure(&self) -> Result<()> {
        // journal_mode returns a row and is a no-op for in-memory databases
        self.conn
            .query("PRAGMA journal_mode = WAL;", ())
            .await
            .ok();
        self.conn
            .execute("PRAGMA synchronous = FULL;", ())
            .await
            .ok();
        self.conn.execute("PRAGMA foreign_keys = ON;", ()).await?;
        Ok(())
    }

    /// Run database migrations
    async fn migrate(&self) -> Result<()> {
        migrations::run(&self.conn).await
    }

    /// Get a reference to the underlying connection
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }
}

/// Start a write transaction on `conn`.
pub(crate) async fn begin(conn: &Connection) -> Result<()> {
    // A caller cancelled mid-transaction leaves it open on the shared connection.
    if !conn.is_autocommit() {
        tracing::warn!("Rolling back abandoned transaction");
        conn.execute("ROLLBACK", ()).await.ok();
    }
    conn.execute("BEGIN IMMEDIATE", ()).await?;
    Ok(())
}

/// Commit when `result` is `Ok`, roll back otherwise.
pub(crate) async fn finish<T>(conn: &Connection, result: Result<T>) -> Result<T> {
    match result {
        Ok(value) => {
            if let Err(error) = conn.execute("COMMIT", ()).await {
                conn.execute("ROLLBACK", ()).await.ok();
                return Err(error.into());
            }
            Ok(value)
        }
        Err(error) => {
            conn.execute("ROLLBACK", ()).await.ok();
            Err(error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test(flavor = "multi_thread")]
    async fn test_open_in_memory() {
        let db = Database::open_in_memory().await.unwrap();
        let mut rows = db.connection().query("SELECT 1", ()).await.unwrap();
        let row = rows.next().await.unwrap().unwrap();
        assert_eq!(row.get::<i32>(0).unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_open_on_disk_persists_rows() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("habits.db");

        {
            let db = Database::open(&path).await.unwrap();
            db.connection()
                .execute(
                    "INSERT INTO sync_metadata (key, value) VALUES ('probe', 'yes')",
                    (),
                )
                .await
                .unwrap();
        }

        let db = Database::open(&path).await.unwrap();
        let mut rows = db
            .connection()
            .query("SELECT value FROM sync_metadata WHERE key = 'probe'", ())
            .await
            .unwrap();
        let row = rows.next().await.unwrap().unwrap();
        assert_eq!(row.get::<String>(0).unwrap(), "yes");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_rollback_discards_writes() {
        let db = Database::open_in_memory().await.unwrap();
        let conn = db.connection();

        begin(conn).await.unwrap();
        conn.execute(
            "INSERT INTO sync_metadata (key, value) VALUES ('k', 'v')",
            (),
        )
        .await
        .unwrap();
        let failed: Result<()> = Err(crate::Error::Database("boom".into()));
        assert!(finish(conn, failed).await.is_err());

        let mut rows = conn
            .query("SELECT COUNT(*) FROM sync_metadata", ())
            .await
            .unwrap();
        let count: i64 = rows.next().await.unwrap().unwrap().get(0).unwrap();
        assert_eq!(count, 0);
    }
}

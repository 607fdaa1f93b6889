//! Sync metadata repository implementation

use crate::error::Result;
use libsql::Connection;

pub const LAST_SUCCESSFUL_SYNC_AT: &str = "last_successful_sync_at";
pub const LAST_SYNC_ATTEMPT_AT: &str = "last_sync_attempt_at";

/// Trait for the diagnostics key-value area (async)
#[allow(async_fn_in_trait)]
pub trait MetadataRepository {
    /// Read a raw value
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a raw value
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Read a Unix-ms timestamp value
    async fn get_timestamp(&self, key: &str) -> Result<Option<i64>> {
        Ok(self.get(key).await?.and_then(|value| value.parse().ok()))
    }

    /// Write a Unix-ms timestamp value
    async fn set_timestamp(&self, key: &str, timestamp: i64) -> Result<()> {
        self.set(key, &timestamp.to_string()).await
    }
}

/// libSQL implementation of `MetadataRepository`
pub struct LibSqlMetadataRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlMetadataRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl MetadataRepository for LibSqlMetadataRepository<'_> {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut rows = self
            .conn
            .query("SELECT value FROM sync_metadata WHERE key = ?", [key])
            .await?;

        if let Some(row) = rows.next().await? {
            let value: String = row.get(0)?;
            Ok(Some(value))
        } else {
            Ok(None)
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO sync_metadata (key, value) VALUES (?, ?)",
                [key, value],
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    async fn setup() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_missing_key_is_none() {
        let db = setup().await;
        let repo = LibSqlMetadataRepository::new(db.connection());

        assert_eq!(repo.get(LAST_SUCCESSFUL_SYNC_AT).await.unwrap(), None);
        assert_eq!(repo.get_timestamp(LAST_SYNC_ATTEMPT_AT).await.unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_set_overwrites_value() {
        let db = setup().await;
        let repo = LibSqlMetadataRepository::new(db.connection());

        repo.set_timestamp(LAST_SUCCESSFUL_SYNC_AT, 100).await.unwrap();
        repo.set_timestamp(LAST_SUCCESSFUL_SYNC_AT, 200).await.unwrap();

        assert_eq!(
            repo.get_timestamp(LAST_SUCCESSFUL_SYNC_AT).await.unwrap(),
            Some(200)
        );
    }
}

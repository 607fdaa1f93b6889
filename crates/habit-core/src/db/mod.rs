//! Database layer for habit-sync

mod connection;
mod habit_repository;
mod metadata_repository;
mod migrations;
mod queue_repository;

pub(crate) use connection::{begin, finish};
pub use connection::Database;
pub use habit_repository::{HabitRepository, LibSqlHabitRepository};
pub use metadata_repository::{
    LibSqlMetadataRepository, MetadataRepository, LAST_SUCCESSFUL_SYNC_AT, LAST_SYNC_ATTEMPT_AT,
};
pub use queue_repository::{ChangeQueueRepository, LibSqlChangeQueueRepository};

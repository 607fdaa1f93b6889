use std::io;

use habit_core::sync::GatewayError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] habit_core::Error),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No habit name provided")]
    EmptyName,
    #[error("Habit ID cannot be empty")]
    EmptyHabitId,
    #[error("Habit not found for id/prefix: {0}")]
    HabitNotFound(String),
    #[error("{0}")]
    AmbiguousHabitId(String),
    #[error("Nothing to change. Pass --name, --days, or --reminder")]
    NothingToEdit,
    #[error("Sync failed: {0}")]
    SyncFailed(String),
    #[error(
        "Sync is not configured. Set HABIT_API_BASE_URL (a .env file works too)."
    )]
    SyncNotConfigured,
}

//! habit-core - Core library for habit-sync
//!
//! This crate contains the habit models, the local database layer, the streak
//! rules, and the offline-first sync engine used by every habit-sync client.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod state;
pub mod streak;
pub mod sync;
pub mod util;

pub use config::SyncConfig;
pub use error::{Error, Result};
pub use models::{ChangeAction, ChangeIntent, HabitId, HabitRecord, Weekday};
pub use services::{HabitStore, RecordsSubscription};
pub use state::SyncState;
pub use sync::{HttpGateway, RemoteGateway, SyncEngine, SyncOptions, SyncOutcome, SyncStatus};

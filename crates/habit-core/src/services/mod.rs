//! Shared services used across clients.

mod habit_store;

pub use habit_store::{HabitStore, ReconcileStats, RecordsSubscription};

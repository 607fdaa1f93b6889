//! Offline-first synchronization with the habit server.
//!
//! Local mutations land in the [`HabitStore`](crate::services::HabitStore)
//! together with a queued intent. A [`SyncEngine`] pass uploads those intents
//! through a [`RemoteGateway`], fetches the server's copy, and reconciles it
//! field by field (see [`merge`]).

mod backoff;
mod engine;
mod gateway;
mod http;
pub mod merge;
mod outcome;
mod plan;
#[cfg(test)]
mod testing;

pub use backoff::Backoff;
pub use engine::{SchedulerHandle, SyncEngine, SyncOptions};
pub use gateway::{GatewayError, GatewayResult, RemoteGateway, RemoteHabit};
pub use http::HttpGateway;
pub use merge::{merge_remote, MergeDecision};
pub use outcome::{SyncOutcome, SyncReport, SyncStatus};
pub use plan::{coalesce, PlannedChange};

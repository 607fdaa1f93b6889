//! Shared sync state types observed by clients.

use std::fmt;

/// Phase of the sync pass currently running, or `Idle` between passes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SyncState {
    #[default]
    Idle,
    DrainingQueue,
    FetchingRemote,
    Reconciling,
}

impl SyncState {
    pub const fn is_active(self) -> bool {
        !matches!(self, Self::Idle)
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::DrainingQueue => "draining queue",
            Self::FetchingRemote => "fetching remote",
            Self::Reconciling => "reconciling",
        };
        f.write_str(label)
    }
}

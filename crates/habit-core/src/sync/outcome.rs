//! Results of a sync pass.

use std::fmt;

use serde::Serialize;

use crate::state::SyncState;

/// Counters collected during one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Records uploaded and confirmed.
    pub transmitted: usize,
    /// Deletes confirmed by the server.
    pub deleted: usize,
    /// Transmissions that failed and stay queued.
    pub failed: usize,
    /// Failures where the server refused the payload.
    pub rejected: usize,
    /// Records quarantined during this pass.
    pub quarantined: usize,
    /// Quarantined records left out of this pass.
    pub skipped_blocked: usize,
    pub fetched: usize,
    pub inserted: usize,
    pub updated: usize,
    /// The remote fetch failed; local data may be behind the server.
    pub remote_stale: bool,
}

impl SyncReport {
    const fn succeeded_calls(&self) -> usize {
        self.transmitted + self.deleted + if self.remote_stale { 0 } else { 1 }
    }

    const fn failed_calls(&self) -> usize {
        self.failed + if self.remote_stale { 1 } else { 0 }
    }
}

/// How a pass ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Every remote call succeeded.
    Success(SyncReport),
    /// Some calls failed; their changes stay queued.
    PartialFailure(SyncReport),
    /// Nothing reached the server, or local storage failed.
    TotalFailure { report: SyncReport, reason: String },
}

impl SyncOutcome {
    /// Classify a pass that ran to completion.
    pub fn from_report(report: SyncReport) -> Self {
        if report.failed_calls() == 0 {
            Self::Success(report)
        } else if report.succeeded_calls() == 0 {
            let reason = if report.remote_stale && report.failed == 0 {
                "remote unreachable".to_string()
            } else {
                format!("{} transmission(s) failed, remote unreachable", report.failed)
            };
            Self::TotalFailure { report, reason }
        } else {
            Self::PartialFailure(report)
        }
    }

    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub const fn report(&self) -> &SyncReport {
        match self {
            Self::Success(report) | Self::PartialFailure(report) => report,
            Self::TotalFailure { report, .. } => report,
        }
    }
}

impl fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = self.report();
        match self {
            Self::Success(_) => write!(f, "success")?,
            Self::PartialFailure(_) => write!(f, "partial failure")?,
            Self::TotalFailure { reason, .. } => write!(f, "failed: {reason}")?,
        }
        write!(
            f,
            " (sent {}, deleted {}, failed {}, fetched {}, inserted {}, updated {})",
            report.transmitted,
            report.deleted,
            report.failed,
            report.fetched,
            report.inserted,
            report.updated
        )
    }
}

/// Snapshot published to status subscribers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStatus {
    pub state: SyncState,
    pub last_outcome: Option<SyncOutcome>,
    pub passes_completed: u64,
}

impl SyncStatus {
    pub const fn is_syncing(&self) -> bool {
        self.state.is_active()
    }
}

//! Sync engine: drains the local queue, fetches the server's copy, reconciles.
//!
//! One pass runs at a time per engine. `trigger_sync` while a pass is running
//! schedules exactly one follow-up pass; further triggers before it starts are
//! absorbed. The engine never cancels a pass midway, so every record's call
//! either completes or fails as a whole.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use crate::config::SyncConfig;
use crate::db::{LAST_SUCCESSFUL_SYNC_AT, LAST_SYNC_ATTEMPT_AT};
use crate::models::ChangeAction;
use crate::services::HabitStore;
use crate::state::SyncState;
use crate::util::unix_millis_now;
use crate::Result;

use super::backoff::Backoff;
use super::gateway::{GatewayError, RemoteGateway, RemoteHabit};
use super::outcome::{SyncOutcome, SyncReport, SyncStatus};
use super::plan::{coalesce, PlannedChange};

/// Retry and scheduling knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    /// Failed attempts before a record is quarantined; `0` retries forever.
    pub max_retries: u32,
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
    pub sync_interval: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            max_retries: 8,
            backoff_base: Duration::from_secs(10),
            backoff_cap: Duration::from_secs(600),
            sync_interval: Duration::from_secs(900),
        }
    }
}

impl From<&SyncConfig> for SyncOptions {
    fn from(config: &SyncConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff_base: config.backoff_base(),
            backoff_cap: config.backoff_cap(),
            sync_interval: config.sync_interval(),
        }
    }
}

struct EngineInner<G> {
    store: HabitStore,
    gateway: G,
    owner_id: String,
    options: SyncOptions,
    pass_lock: Mutex<()>,
    driving: AtomicBool,
    rerun: AtomicBool,
    status: watch::Sender<SyncStatus>,
}

/// Synchronizes one owner's habits between a [`HabitStore`] and a gateway.
pub struct SyncEngine<G> {
    inner: Arc<EngineInner<G>>,
}

impl<G> Clone for SyncEngine<G> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Running periodic scheduler.
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stop scheduling. A pass already running finishes first.
    pub async fn shutdown(self) {
        self.shutdown.send_replace(true);
        if let Err(error) = self.task.await {
            tracing::warn!("Sync scheduler ended abnormally: {error}");
        }
    }
}

impl<G: RemoteGateway> SyncEngine<G> {
    pub fn new(
        store: HabitStore,
        gateway: G,
        owner_id: impl Into<String>,
        options: SyncOptions,
    ) -> Self {
        let (status, _) = watch::channel(SyncStatus::default());
        Self {
            inner: Arc::new(EngineInner {
                store,
                gateway,
                owner_id: owner_id.into(),
                options,
                pass_lock: Mutex::new(()),
                driving: AtomicBool::new(false),
                rerun: AtomicBool::new(false),
                status,
            }),
        }
    }

    pub fn from_config(store: HabitStore, gateway: G, config: &SyncConfig) -> Self {
        Self::new(store, gateway, config.owner_id.clone(), SyncOptions::from(config))
    }

    pub fn store(&self) -> &HabitStore {
        &self.inner.store
    }

    pub fn gateway(&self) -> &G {
        &self.inner.gateway
    }

    pub fn owner_id(&self) -> &str {
        &self.inner.owner_id
    }

    /// True from the start to the end of a pass.
    pub fn is_syncing(&self) -> bool {
        self.inner.status.borrow().is_syncing()
    }

    pub fn status(&self) -> SyncStatus {
        self.inner.status.borrow().clone()
    }

    /// Observe pass state changes and outcomes.
    pub fn subscribe_status(&self) -> watch::Receiver<SyncStatus> {
        self.inner.status.subscribe()
    }

    /// Run one pass and wait for its outcome.
    pub async fn sync_now(&self) -> SyncOutcome {
        self.inner.run_pass().await
    }

    /// Request a pass in the background and return immediately.
    pub fn trigger_sync(&self) {
        self.inner.rerun.store(true, Ordering::SeqCst);
        if self
            .inner
            .driving
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Sync already running, follow-up pass scheduled");
            return;
        }

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move { inner.drive().await });
    }

    /// Run passes periodically, backing off after failed passes.
    pub fn spawn_scheduler(&self) -> SchedulerHandle {
        let (shutdown, mut stop) = watch::channel(false);
        let inner = Arc::clone(&self.inner);

        let task = tokio::spawn(async move {
            let mut backoff = Backoff::new(
                inner.options.backoff_base,
                inner.options.backoff_cap,
                inner.options.sync_interval,
            );
            loop {
                let outcome = inner.run_pass().await;
                let delay = if outcome.is_success() {
                    backoff.succeeded()
                } else {
                    backoff.failed()
                };
                tracing::debug!(
                    "Next sync in {}s (consecutive failures: {})",
                    delay.as_secs(),
                    backoff.failures()
                );

                tokio::select! {
                    () = tokio::time::sleep(delay) => {}
                    _ = stop.changed() => break,
                }
                if *stop.borrow() {
                    break;
                }
            }
            tracing::debug!("Sync scheduler stopped");
        });

        SchedulerHandle { shutdown, task }
    }
}

impl<G: RemoteGateway> EngineInner<G> {
    async fn drive(self: Arc<Self>) {
        loop {
            while self.rerun.swap(false, Ordering::SeqCst) {
                self.run_pass().await;
            }
            self.driving.store(false, Ordering::SeqCst);

            // A trigger may land between the last swap and clearing `driving`.
            if !self.rerun.load(Ordering::SeqCst)
                || self
                    .driving
                    .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                    .is_err()
            {
                break;
            }
        }
    }

    async fn run_pass(&self) -> SyncOutcome {
        let _pass = self.pass_lock.lock().await;
        self.set_state(SyncState::DrainingQueue);
        tracing::debug!("Sync pass started for owner {}", self.owner_id);

        let mut report = SyncReport::default();
        let outcome = match self.execute_pass(&mut report).await {
            Ok(()) => SyncOutcome::from_report(report),
            Err(error) => {
                tracing::error!("Sync pass aborted by local storage error: {error}");
                SyncOutcome::TotalFailure {
                    report,
                    reason: error.to_string(),
                }
            }
        };

        if outcome.is_success() {
            tracing::info!("Sync pass finished: {outcome}");
        } else {
            tracing::warn!("Sync pass finished: {outcome}");
        }

        self.status.send_modify(|status| {
            status.state = SyncState::Idle;
            status.last_outcome = Some(outcome.clone());
            status.passes_completed += 1;
        });
        outcome
    }

    fn set_state(&self, state: SyncState) {
        self.status.send_modify(|status| status.state = state);
    }

    async fn execute_pass(&self, report: &mut SyncReport) -> Result<()> {
        self.store
            .record_sync_timestamp(LAST_SYNC_ATTEMPT_AT, unix_millis_now())
            .await?;

        self.drain_queue(report).await?;

        self.set_state(SyncState::FetchingRemote);
        let remote = match self.gateway.list_records(&self.owner_id).await {
            Ok(remote) => remote,
            Err(error) => {
                tracing::warn!("Fetching remote habits failed, local data may be stale: {error}");
                report.remote_stale = true;
                return Ok(());
            }
        };
        report.fetched = remote.len();

        self.set_state(SyncState::Reconciling);
        let stats = self.store.reconcile_remote(&self.owner_id, &remote).await?;
        report.inserted = stats.inserted;
        report.updated = stats.updated;

        let purged = self.store.purge_deleted_and_synced().await?;
        if purged > 0 {
            tracing::debug!("Purged {purged} deleted habit(s)");
        }

        if report.failed == 0 {
            self.store
                .record_sync_timestamp(LAST_SUCCESSFUL_SYNC_AT, unix_millis_now())
                .await?;
        }
        Ok(())
    }

    async fn drain_queue(&self, report: &mut SyncReport) -> Result<()> {
        // Re-read at drain time so intents enqueued since the last pass are seen.
        let intents = self.store.pending_changes().await?;
        if intents.is_empty() {
            return Ok(());
        }

        let plan = coalesce(&intents);
        tracing::debug!(
            "Draining {} queued change(s) across {} habit(s)",
            intents.len(),
            plan.len()
        );
        for change in &plan {
            self.transmit(change, report).await?;
        }
        Ok(())
    }

    async fn transmit(&self, change: &PlannedChange, report: &mut SyncReport) -> Result<()> {
        let habit = self.store.get_by_id(&change.habit_id).await?;
        if let Some(habit) = &habit {
            if habit.owner_id != self.owner_id {
                return Ok(());
            }
            if habit.sync_blocked {
                report.skipped_blocked += 1;
                return Ok(());
            }
        }

        match (change.action, habit) {
            (ChangeAction::Delete, _) => {
                match self.gateway.delete_record(&change.habit_id).await {
                    Ok(()) => {
                        self.store.complete_delete(&change.habit_id).await?;
                        tracing::debug!("Habit {} deleted remotely", change.habit_id);
                        report.deleted += 1;
                    }
                    Err(error) => self.record_failure(change, &error, report).await?,
                }
            }
            (action, None) => {
                tracing::warn!(
                    "Dropping queued {action} for missing habit {}",
                    change.habit_id
                );
                self.store.abandon_changes(&change.habit_id).await?;
            }
            (action, Some(habit)) if habit.is_deleted => {
                tracing::warn!(
                    "Dropping queued {action} for deleted habit {}",
                    change.habit_id
                );
                self.store.abandon_changes(&change.habit_id).await?;
            }
            (_, Some(habit)) => {
                let payload = RemoteHabit::from(&habit);
                match self.gateway.upsert_record(&payload).await {
                    Ok(_) => {
                        let synced = self
                            .store
                            .complete_transmission(&habit.id, change.through_queue_id())
                            .await?;
                        if synced {
                            tracing::debug!("Habit {} uploaded", habit.id);
                        } else {
                            tracing::debug!(
                                "Habit {} uploaded but changed meanwhile, staying queued",
                                habit.id
                            );
                        }
                        report.transmitted += 1;
                    }
                    Err(error) => self.record_failure(change, &error, report).await?,
                }
            }
        }
        Ok(())
    }

    async fn record_failure(
        &self,
        change: &PlannedChange,
        error: &GatewayError,
        report: &mut SyncReport,
    ) -> Result<()> {
        report.failed += 1;
        let attempts = change.retry_count.saturating_add(1);

        if error.is_rejection() {
            report.rejected += 1;
            tracing::error!(
                "Server rejected {} of habit {} (attempt {attempts}): {error}",
                change.action,
                change.habit_id
            );
        } else {
            tracing::warn!(
                "{} of habit {} failed (attempt {attempts}): {error}",
                change.action,
                change.habit_id
            );
        }

        // Being offline says nothing about the record itself.
        let reached_server = !matches!(error, GatewayError::Transport(_));
        let block =
            reached_server && self.options.max_retries > 0 && attempts >= self.options.max_retries;

        self.store
            .record_transmission_failure(&change.habit_id, &change.queue_ids, block)
            .await?;

        if block {
            report.quarantined += 1;
            tracing::error!(
                "Habit {} quarantined after {attempts} failed attempts",
                change.habit_id
            );
        }
        Ok(())
    }
}

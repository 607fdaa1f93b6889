//! In-memory gateway for engine tests.
//!
//! Behaves like an idempotent habit server and can be scripted to go offline,
//! fail specific records, or hold uploads until released.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::Notify;

use crate::models::HabitId;

use super::gateway::{GatewayError, GatewayResult, RemoteGateway, RemoteHabit};

#[derive(Default)]
struct ServerState {
    records: BTreeMap<String, RemoteHabit>,
    offline: bool,
    fetch_error: Option<GatewayError>,
    failing_ids: HashMap<String, GatewayError>,
    upload_gate: Option<Arc<UploadGate>>,
    uploads: Vec<RemoteHabit>,
    deletes: Vec<String>,
    fetches: usize,
}

/// Holds uploads until the test releases them.
#[derive(Default)]
pub struct UploadGate {
    entered: Notify,
    release: Notify,
}

impl UploadGate {
    /// Wait until an upload is parked at the gate.
    pub async fn wait_entered(&self) {
        self.entered.notified().await;
    }

    /// Let one parked upload continue.
    pub fn release_one(&self) {
        self.release.notify_one();
    }
}

/// Scriptable in-memory [`RemoteGateway`].
#[derive(Clone, Default)]
pub struct ScriptedGateway {
    state: Arc<Mutex<ServerState>>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, ServerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Put a record on the server directly.
    pub fn insert_server_record(&self, habit: RemoteHabit) {
        if let Some(id) = habit.id.clone() {
            self.state().records.insert(id, habit);
        }
    }

    pub fn server_record(&self, id: &HabitId) -> Option<RemoteHabit> {
        self.state().records.get(id.as_str()).cloned()
    }

    /// Fail every call with a transport error while set.
    pub fn set_offline(&self, offline: bool) {
        self.state().offline = offline;
    }

    /// Fail fetches with `error` while set, leaving uploads working.
    pub fn set_fetch_error(&self, error: Option<GatewayError>) {
        self.state().fetch_error = error;
    }

    /// Fail every upload and delete of `id` with `error`.
    pub fn fail_record(&self, id: &HabitId, error: GatewayError) {
        self.state().failing_ids.insert(id.to_string(), error);
    }

    pub fn clear_record_failure(&self, id: &HabitId) {
        self.state().failing_ids.remove(id.as_str());
    }

    /// Park uploads at the returned gate until released.
    pub fn pause_uploads(&self) -> Arc<UploadGate> {
        let gate = Arc::new(UploadGate::default());
        self.state().upload_gate = Some(Arc::clone(&gate));
        gate
    }

    pub fn resume_uploads(&self) {
        self.state().upload_gate = None;
    }

    /// Every upload payload received, in order.
    pub fn uploads(&self) -> Vec<RemoteHabit> {
        self.state().uploads.clone()
    }

    /// Every delete received, in order.
    pub fn deletes(&self) -> Vec<String> {
        self.state().deletes.clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.state().fetches
    }

    fn check_record(&self, id: &str) -> GatewayResult<()> {
        let state = self.state();
        if state.offline {
            return Err(GatewayError::Transport("network is unreachable".to_string()));
        }
        match state.failing_ids.get(id) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

impl RemoteGateway for ScriptedGateway {
    async fn list_records(&self, owner_id: &str) -> GatewayResult<Vec<RemoteHabit>> {
        let mut state = self.state();
        state.fetches += 1;
        if state.offline {
            return Err(GatewayError::Transport("network is unreachable".to_string()));
        }
        if let Some(error) = state.fetch_error.clone() {
            return Err(error);
        }
        Ok(state
            .records
            .values()
            .filter(|habit| habit.user_id.as_deref() == Some(owner_id))
            .cloned()
            .collect())
    }

    async fn upsert_record(&self, habit: &RemoteHabit) -> GatewayResult<RemoteHabit> {
        let id = habit
            .id
            .clone()
            .ok_or_else(|| GatewayError::InvalidPayload("habit has no id".to_string()))?;

        let gate = self.state().upload_gate.clone();
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }

        self.check_record(&id)?;
        let mut state = self.state();
        state.uploads.push(habit.clone());
        state.records.insert(id, habit.clone());
        Ok(habit.clone())
    }

    async fn delete_record(&self, id: &HabitId) -> GatewayResult<()> {
        self.check_record(id.as_str())?;
        let mut state = self.state();
        state.deletes.push(id.to_string());
        state.records.remove(id.as_str());
        Ok(())
    }
}

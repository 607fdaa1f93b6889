use std::path::Path;

use habit_core::HabitStore;
use serde::Serialize;

use crate::commands::common::{
    describe_sync_time, format_habit_lines, habit_to_list_item, open_store, HabitListItem,
};
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub owner: String,
    pub db_path: String,
    pub habits: usize,
    pub unsynced: usize,
    pub pending_changes: u64,
    pub blocked: Vec<HabitListItem>,
    pub last_successful_sync_at: Option<i64>,
    pub last_sync_attempt_at: Option<i64>,
}

pub async fn run_status(as_json: bool, owner: &str, db_path: &Path) -> Result<(), CliError> {
    let store = open_store(db_path).await?;
    let report = collect_status(&store, owner, db_path).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Owner:            {}", report.owner);
    println!("Database:         {}", report.db_path);
    println!("Habits:           {}", report.habits);
    println!("Unsynced habits:  {}", report.unsynced);
    println!("Pending changes:  {}", report.pending_changes);
    println!(
        "Last sync:        {}",
        describe_sync_time(report.last_successful_sync_at)
    );
    println!(
        "Last attempt:     {}",
        describe_sync_time(report.last_sync_attempt_at)
    );

    let blocked = store.list_blocked(owner).await?;
    if !blocked.is_empty() {
        println!();
        println!("Quarantined (run `habit unblock <id>` to retry):");
        for line in format_habit_lines(&blocked) {
            println!("  {line}");
        }
    }
    Ok(())
}

pub async fn collect_status(
    store: &HabitStore,
    owner: &str,
    db_path: &Path,
) -> Result<StatusReport, CliError> {
    let habits = store.list_records(owner).await?;
    let blocked = store.list_blocked(owner).await?;

    Ok(StatusReport {
        owner: owner.to_string(),
        db_path: db_path.display().to_string(),
        habits: habits.len(),
        unsynced: habits.iter().filter(|habit| !habit.is_synced).count(),
        pending_changes: store.pending_count().await?,
        blocked: blocked.iter().map(habit_to_list_item).collect(),
        last_successful_sync_at: store.last_successful_sync_at().await?,
        last_sync_attempt_at: store.last_sync_attempt_at().await?,
    })
}

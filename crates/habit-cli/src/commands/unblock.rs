use std::path::Path;

use crate::commands::common::{match_habit, normalize_habit_identifier, open_store};
use crate::error::CliError;

pub async fn run_unblock(id: &str, owner: &str, db_path: &Path) -> Result<(), CliError> {
    let query = normalize_habit_identifier(id)?;
    let store = open_store(db_path).await?;

    // Quarantined habits may already be deleted locally, so search the blocked list.
    let blocked = store.list_blocked(owner).await?;
    let habit = match_habit(&blocked, &query)?;

    store.unblock_record(&habit.id).await?;
    println!("{}", habit.id);
    Ok(())
}

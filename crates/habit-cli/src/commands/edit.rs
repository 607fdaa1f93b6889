use std::path::Path;

use crate::commands::common::{open_store, resolve_habit};
use crate::error::CliError;

pub async fn run_edit(
    id: &str,
    name: Option<&str>,
    days: &[String],
    reminder: Option<&str>,
    owner: &str,
    db_path: &Path,
) -> Result<(), CliError> {
    if name.is_none() && days.is_empty() && reminder.is_none() {
        return Err(CliError::NothingToEdit);
    }

    let store = open_store(db_path).await?;
    let habit = resolve_habit(&store, owner, id).await?;

    let name = name.unwrap_or(habit.name.as_str());
    let reminder = reminder.unwrap_or(habit.reminder_time.as_str());
    let days = if days.is_empty() {
        habit
            .active_days
            .iter()
            .map(|day| day.as_str().to_string())
            .collect()
    } else {
        days.to_vec()
    };

    let updated = store.update_record(&habit.id, name, &days, reminder).await?;
    println!("{}", updated.id);
    Ok(())
}

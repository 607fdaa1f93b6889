use std::path::Path;

use crate::commands::common::{format_habit_lines, habit_to_list_item, open_store, HabitListItem};
use crate::error::CliError;

pub async fn run_list(
    completed: bool,
    as_json: bool,
    owner: &str,
    db_path: &Path,
) -> Result<(), CliError> {
    let store = open_store(db_path).await?;
    let habits = if completed {
        store.list_completed(owner).await?
    } else {
        store.list_records(owner).await?
    };

    if as_json {
        let json_items = habits
            .iter()
            .map(habit_to_list_item)
            .collect::<Vec<HabitListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else if habits.is_empty() {
        println!("No habits yet. Add one with `habit add <name> --days mon,wed,fri`.");
    } else {
        for line in format_habit_lines(&habits) {
            println!("{line}");
        }
    }

    Ok(())
}

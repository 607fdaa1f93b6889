use std::path::Path;

use chrono::NaiveDate;

use crate::commands::common::{open_store, resolve_habit};
use crate::error::CliError;

pub async fn run_check(
    id: &str,
    date: Option<NaiveDate>,
    owner: &str,
    db_path: &Path,
) -> Result<(), CliError> {
    let store = open_store(db_path).await?;
    let habit = resolve_habit(&store, owner, id).await?;

    let checked = match date {
        Some(date) => store.set_checked_on(&habit.id, true, date).await?,
        None => store.set_checked(&habit.id, true).await?,
    };

    println!(
        "{}  streak {} (best {})",
        checked.id, checked.current_streak, checked.longest_streak
    );
    Ok(())
}

pub async fn run_uncheck(id: &str, owner: &str, db_path: &Path) -> Result<(), CliError> {
    let store = open_store(db_path).await?;
    let habit = resolve_habit(&store, owner, id).await?;

    let unchecked = store.set_checked(&habit.id, false).await?;
    println!("{}", unchecked.id);
    Ok(())
}

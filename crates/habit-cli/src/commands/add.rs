use std::path::Path;

use crate::commands::common::{open_store, resolve_habit_name};
use crate::error::CliError;

pub async fn run_add(
    name_parts: &[String],
    days: &[String],
    reminder: &str,
    owner: &str,
    db_path: &Path,
) -> Result<(), CliError> {
    let name = resolve_habit_name(name_parts)?;

    let store = open_store(db_path).await?;
    let id = store.create_record(owner, &name, days, reminder).await?;

    println!("{id}");
    Ok(())
}

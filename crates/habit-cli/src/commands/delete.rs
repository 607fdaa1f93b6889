use std::path::Path;

use crate::commands::common::{open_store, resolve_habit};
use crate::error::CliError;

pub async fn run_delete(id: &str, owner: &str, db_path: &Path) -> Result<(), CliError> {
    let store = open_store(db_path).await?;
    let habit = resolve_habit(&store, owner, id).await?;

    store.delete_record(&habit.id).await?;
    println!("{}", habit.id);
    Ok(())
}

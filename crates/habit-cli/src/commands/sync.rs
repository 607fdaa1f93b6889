use std::path::Path;

use habit_core::{HttpGateway, SyncEngine, SyncOutcome};

use crate::commands::common::{load_sync_config, open_store};
use crate::error::CliError;

pub async fn run_sync(owner: &str, db_path: &Path) -> Result<(), CliError> {
    let config = load_sync_config(owner)?;
    let store = open_store(db_path).await?;
    let gateway = HttpGateway::new(config.api_base_url.clone(), config.request_timeout())?;
    let engine = SyncEngine::from_config(store, gateway, &config);

    let outcome = engine.sync_now().await;
    match &outcome {
        SyncOutcome::Success(_) => println!("Sync completed: {outcome}"),
        SyncOutcome::PartialFailure(_) => {
            println!("Sync completed with errors: {outcome}");
            println!("Failed changes stay queued and will be retried.");
        }
        SyncOutcome::TotalFailure { reason, .. } => {
            return Err(CliError::SyncFailed(reason.clone()));
        }
    }

    let blocked = engine.store().list_blocked(owner).await?;
    if !blocked.is_empty() {
        println!(
            "{} habit(s) are quarantined after repeated failures; see `habit status`.",
            blocked.len()
        );
    }
    Ok(())
}

//! habit CLI - Command-line interface for habit-sync
//!
//! Every command works offline against the local store; `habit sync` talks to
//! the server.

mod cli;
mod commands;
mod error;


use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::check::{run_check, run_uncheck};
use crate::commands::common::{resolve_db_path, resolve_owner};
use crate::commands::{
    add::run_add, delete::run_delete, edit::run_edit, list::run_list, status::run_status,
    sync::run_sync, unblock::run_unblock,
};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("habit=info,habit_core=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path);
    let owner = resolve_owner(cli.owner);

    match cli.command {
        Some(Commands::Add {
            name,
            days,
            reminder,
        }) => run_add(&name, &days, &reminder, &owner, &db_path).await?,
        Some(Commands::Edit {
            id,
            name,
            days,
            reminder,
        }) => {
            run_edit(
                &id,
                name.as_deref(),
                &days,
                reminder.as_deref(),
                &owner,
                &db_path,
            )
            .await?;
        }
        Some(Commands::Check { id, date }) => run_check(&id, date, &owner, &db_path).await?,
        Some(Commands::Uncheck { id }) => run_uncheck(&id, &owner, &db_path).await?,
        Some(Commands::Delete { id }) => run_delete(&id, &owner, &db_path).await?,
        Some(Commands::List { completed, json }) => {
            run_list(completed, json, &owner, &db_path).await?;
        }
        Some(Commands::Sync) => run_sync(&owner, &db_path).await?,
        Some(Commands::Status { json }) => run_status(json, &owner, &db_path).await?,
        Some(Commands::Unblock { id }) => run_unblock(&id, &owner, &db_path).await?,
        None => {
            Cli::command().print_help().map_err(CliError::Io)?;
            println!();
        }
    }

    Ok(())
}

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "habit")]
#[command(about = "Track habits offline and sync them when a connection is available")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Owner whose habits to manage (defaults to HABIT_OWNER_ID)
    #[arg(long, global = true, value_name = "ID")]
    pub owner: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new habit
    #[command(alias = "new")]
    Add {
        /// Habit name
        name: Vec<String>,
        /// Active days, comma separated (e.g. mon,wed,fri)
        #[arg(short, long, value_delimiter = ',', required = true)]
        days: Vec<String>,
        /// Reminder time as HH:MM
        #[arg(short, long, default_value = "09:00")]
        reminder: String,
    },
    /// Change a habit's name, days, or reminder
    Edit {
        /// Habit ID or unique ID prefix
        id: String,
        /// New name
        #[arg(long)]
        name: Option<String>,
        /// New active days, comma separated
        #[arg(short, long, value_delimiter = ',')]
        days: Vec<String>,
        /// New reminder time as HH:MM
        #[arg(short, long)]
        reminder: Option<String>,
    },
    /// Mark a habit done for today
    #[command(alias = "done")]
    Check {
        /// Habit ID or unique ID prefix
        id: String,
        /// Check in for another day instead of today
        #[arg(long, value_name = "YYYY-MM-DD")]
        date: Option<NaiveDate>,
    },
    /// Clear today's check mark (the streak is kept)
    Uncheck {
        /// Habit ID or unique ID prefix
        id: String,
    },
    /// Delete a habit
    Delete {
        /// Habit ID or unique ID prefix
        id: String,
    },
    /// List habits
    List {
        /// Only show habits checked today
        #[arg(long)]
        completed: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Upload pending changes and fetch the server's copy
    Sync,
    /// Show pending changes and sync health
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Let a quarantined habit sync again
    Unblock {
        /// Habit ID or unique ID prefix
        id: String,
    },
}

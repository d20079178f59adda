//! IncidentSync CLI
//!
//! Bridges SIEM offenses into issue-tracker tickets.
//!
//! # Commands
//!
//! - `run` - Run the forward sync and retry loops until interrupted
//! - `status` - Show the cursor and the ids pending retry
//! - `seed` - Set the cursor before the first run
//! - `reconcile` - Run one retry reconciliation cycle
//! - `sync-once` - Run one forward sync cycle

mod commands;
mod logging;
mod settings;

use clap::{Parser, Subcommand};
use settings::Settings;
use std::path::PathBuf;
use tracing::warn;

/// Creates tickets for new SIEM offenses and retries failed ones.
#[derive(Parser)]
#[command(name = "incidentsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(global = true, short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run both loops until interrupted
    Run,

    /// Show the cursor and the ids pending retry
    Status {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Set the cursor to the id of the last handled offense
    Seed {
        /// Offense id; the next run starts after it
        id: u64,

        /// Allow lowering an existing cursor
        #[arg(long)]
        force: bool,
    },

    /// Run one retry reconciliation cycle
    Reconcile,

    /// Run one forward sync cycle
    SyncOnce,

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Commands::Version = cli.command {
        commands::print_version();
        return Ok(());
    }

    let settings = Settings::load(&cli.config)?;
    let _logging = logging::init(&settings.logging, cli.verbose)?;
    for warning in &settings.warnings {
        warn!("{warning}");
    }

    match cli.command {
        Commands::Run => {
            settings.log_summary();
            commands::run::run(&settings)?;
        }
        Commands::Status { format } => commands::status::run(&settings, &format)?,
        Commands::Seed { id, force } => commands::seed::run(&settings, id, force)?,
        Commands::Reconcile => commands::reconcile::run(&settings)?,
        Commands::SyncOnce => commands::sync_once::run(&settings)?,
        Commands::Version => commands::print_version(),
    }

    Ok(())
}

//! Sync-once command implementation.

use crate::settings::Settings;
use incidentsync_engine::{ForwardOutcome, ForwardSync};

/// Runs one forward cycle and prints what happened.
pub fn run(settings: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    let forward = ForwardSync::new(settings.build_context()?);

    match forward.run_cycle()? {
        ForwardOutcome::Idle { cursor } => println!("No new offenses after {cursor}"),
        ForwardOutcome::Delivered {
            incident_id,
            ticket,
        } => println!("Offense {incident_id} -> {}", ticket.label()),
        ForwardOutcome::Deferred {
            incident_id,
            reason,
        } => println!("Offense {incident_id} queued for retry: {reason}"),
        ForwardOutcome::Stale {
            cursor,
            incident_id,
        } => println!(
            "Source returned offense {} which is not after cursor {cursor}; cursor unchanged",
            incident_id.map_or_else(|| "without id".to_string(), |id| id.to_string())
        ),
    }
    Ok(())
}

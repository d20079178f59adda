//! Reconcile command implementation.

use crate::settings::Settings;
use incidentsync_engine::RetryReconciler;

/// Runs one retry reconciliation cycle and prints the report.
pub fn run(settings: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    let reconciler = RetryReconciler::new(settings.build_context()?);
    let report = reconciler.run_cycle()?;

    if report.is_empty() {
        println!("No incidents pending retry");
        return Ok(());
    }

    println!("Delivered: {:?}", report.delivered);
    println!("Discarded: {:?}", report.discarded);
    println!("Pending:   {:?}", report.pending);
    for (id, error) in &report.errors {
        println!("  {id}: {error}");
    }
    Ok(())
}

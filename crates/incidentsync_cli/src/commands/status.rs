//! Status command implementation.

use crate::settings::Settings;
use incidentsync_state::{CursorStore, FailureStore};
use serde::Serialize;

/// Persisted state as seen by an operator.
#[derive(Debug, Serialize)]
pub struct StatusReport {
    /// Cursor file path.
    pub cursor_file: String,
    /// Current cursor, if seeded.
    pub cursor: Option<u64>,
    /// Failure file path.
    pub failure_file: String,
    /// Ids pending retry, ascending.
    pub pending: Vec<u64>,
}

/// Runs the status command.
pub fn run(settings: &Settings, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let report = StatusReport {
        cursor_file: settings.cursor_file.display().to_string(),
        cursor: settings.cursor_store().load()?,
        failure_file: settings.failure_file.display().to_string(),
        pending: settings.failure_store().load_all()?.into_iter().collect(),
    };

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        "text" => print_text(&report),
        other => return Err(format!("Unknown format: {other} (expected text or json)").into()),
    }
    Ok(())
}

fn print_text(report: &StatusReport) {
    match report.cursor {
        Some(cursor) => println!("Cursor:  {cursor} ({})", report.cursor_file),
        None => println!("Cursor:  not seeded ({})", report.cursor_file),
    }
    if report.pending.is_empty() {
        println!("Pending: none ({})", report.failure_file);
    } else {
        let ids: Vec<String> = report.pending.iter().map(u64::to_string).collect();
        println!(
            "Pending: {} ({})\n  {}",
            report.pending.len(),
            report.failure_file,
            ids.join(", ")
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::test_settings;

    #[test]
    fn reports_unseeded_state() {
        let dir = tempfile::tempdir().unwrap();
        let settings = test_settings(dir.path());

        run(&settings, "text").unwrap();
        run(&settings, "json").unwrap();
        assert!(run(&settings, "yaml").is_err());
    }

    #[test]
    fn reads_pending_ids() {
        let dir = tempfile::tempdir().unwrap();
        let settings = test_settings(dir.path());
        std::fs::write(&settings.failure_file, "7,5,oops").unwrap();

        let pending: Vec<u64> = settings.failure_store().load_all().unwrap().into_iter().collect();
        assert_eq!(pending, vec![5, 7]);
        run(&settings, "json").unwrap();
    }
}

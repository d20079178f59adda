//! Seed command implementation.

use crate::settings::Settings;
use incidentsync_state::CursorStore;
use tracing::info;

/// Writes the cursor.
///
/// Without `force` the cursor may only move forward.
pub fn run(settings: &Settings, id: u64, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let store = settings.cursor_store();
    let previous = store.load()?;

    match previous {
        Some(current) if id < current && !force => {
            return Err(format!(
                "refusing to lower the cursor from {current} to {id}; pass --force to override"
            )
            .into());
        }
        _ if force => store.reset(id)?,
        _ => store.save(id)?,
    }

    info!(cursor = id, previous = ?previous, "cursor seeded");
    match previous {
        Some(current) => println!("Cursor set to {id} (was {current})"),
        None => println!("Cursor set to {id}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::test_settings;

    #[test]
    fn seeds_and_advances() {
        let dir = tempfile::tempdir().unwrap();
        let settings = test_settings(dir.path());

        run(&settings, 100, false).unwrap();
        run(&settings, 150, false).unwrap();
        assert_eq!(settings.cursor_store().load().unwrap(), Some(150));
    }

    #[test]
    fn lowering_requires_force() {
        let dir = tempfile::tempdir().unwrap();
        let settings = test_settings(dir.path());
        run(&settings, 100, false).unwrap();

        assert!(run(&settings, 50, false).is_err());
        assert_eq!(settings.cursor_store().load().unwrap(), Some(100));

        run(&settings, 50, true).unwrap();
        assert_eq!(settings.cursor_store().load().unwrap(), Some(50));
    }
}

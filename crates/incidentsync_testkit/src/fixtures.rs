//! Test fixtures and state helpers.
//!
//! Provides incidents in the shapes the source returns and temporary
//! directories holding real cursor and failure files.

use incidentsync_protocol::{Incident, IncidentStatus};
use incidentsync_state::{CursorStore, FileCursorStore, FileFailureSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// Base creation time for fixtures (2023-11-14 22:13:20 UTC).
pub const FIXTURE_EPOCH_MS: i64 = 1_700_000_000_000;

/// Creates a complete incident with the given status.
///
/// Creation time grows with the id so the source's ascending sort matches id
/// order, as it does in production.
pub fn incident_with_status(id: u64, status: IncidentStatus) -> Incident {
    let created = FIXTURE_EPOCH_MS + id as i64 * 60_000;
    Incident::new(id, status)
        .with_description(format!("Test offense {id}"))
        .with_incident_type(3)
        .with_times(created, created + 30_000)
        .with_endpoints([serde_json::json!(id)], [serde_json::json!(id + 1)])
}

/// Creates an open incident.
pub fn open_incident(id: u64) -> Incident {
    incident_with_status(id, IncidentStatus::Open)
}

/// Creates a closed incident.
pub fn closed_incident(id: u64) -> Incident {
    incident_with_status(id, IncidentStatus::Closed)
}

/// Creates a hidden incident.
pub fn hidden_incident(id: u64) -> Incident {
    incident_with_status(id, IncidentStatus::Hidden)
}

/// Creates open incidents for every id in `ids`.
pub fn open_incidents(ids: impl IntoIterator<Item = u64>) -> Vec<Incident> {
    ids.into_iter().map(open_incident).collect()
}

/// A temporary directory with file-backed state stores.
pub struct TempState {
    /// The cursor store.
    pub cursor: Arc<FileCursorStore>,
    /// The failure set.
    pub failures: Arc<FileFailureSet>,
    dir: TempDir,
}

impl TempState {
    /// Creates an empty state directory with no cursor.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let cursor = Arc::new(FileCursorStore::open(&dir.path().join("cursor.txt")));
        let failures = Arc::new(FileFailureSet::open(&dir.path().join("failed_offenses.txt")));
        Self {
            cursor,
            failures,
            dir,
        }
    }

    /// Creates a state directory with the cursor seeded to `id`.
    pub fn with_cursor(id: u64) -> Self {
        let state = Self::new();
        state.cursor.save(id).expect("Failed to seed cursor");
        state
    }

    /// Returns the directory path.
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Returns the cursor file path.
    pub fn cursor_path(&self) -> PathBuf {
        self.cursor.path().to_path_buf()
    }

    /// Returns the failure file path.
    pub fn failure_path(&self) -> PathBuf {
        self.failures.path().to_path_buf()
    }

    /// Overwrites the failure file with raw content.
    pub fn write_raw_failures(&self, content: &str) {
        std::fs::write(self.failure_path(), content).expect("Failed to write failure file");
    }

    /// Reads the failure file verbatim; empty if it does not exist.
    pub fn read_raw_failures(&self) -> String {
        std::fs::read_to_string(self.failure_path()).unwrap_or_default()
    }
}

impl Default for TempState {
    fn default() -> Self {
        Self::new()
    }
}

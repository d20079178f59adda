//! File-backed stores.

use crate::error::{StateError, StateResult};
use crate::format::{format_cursor, format_failure_list, parse_cursor, parse_failure_list};
use crate::lock::StateFile;
use crate::store::{CursorStore, FailureStore};
use std::collections::BTreeSet;
use std::path::Path;

/// A cursor persisted as a single decimal integer in a file.
///
/// # Durability
///
/// Every save rewrites the file through a temp file and rename, then fsyncs
/// the directory. A crash leaves either the old or the new value.
///
/// # Example
///
/// ```no_run
/// use incidentsync_state::{CursorStore, FileCursorStore};
/// use std::path::Path;
///
/// let cursor = FileCursorStore::open(Path::new("state/last_processed_id"));
/// cursor.save(1200).unwrap();
/// assert_eq!(cursor.load().unwrap(), Some(1200));
/// ```
#[derive(Debug)]
pub struct FileCursorStore {
    file: StateFile,
}

impl FileCursorStore {
    /// Creates a store for the cursor file at `path`.
    ///
    /// The file does not need to exist yet; parent directories are created on
    /// the first save.
    #[must_use]
    pub fn open(path: &Path) -> Self {
        Self {
            file: StateFile::new(path),
        }
    }

    /// Returns the path to the cursor file.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Overwrites the cursor without the monotonicity check.
    ///
    /// Intended for operators re-seeding a misconfigured cursor. The loops
    /// always go through [`CursorStore::save`].
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn reset(&self, id: u64) -> StateResult<()> {
        self.file
            .with_lock(|file| file.write_atomic(&format_cursor(id)))
    }

    fn read_locked(file: &StateFile) -> StateResult<Option<u64>> {
        match file.read()? {
            Some(content) => {
                parse_cursor(&content).map_err(|message| StateError::corrupted(file.path(), message))
            }
            None => Ok(None),
        }
    }
}

impl CursorStore for FileCursorStore {
    fn load(&self) -> StateResult<Option<u64>> {
        self.file.with_lock(Self::read_locked)
    }

    fn save(&self, id: u64) -> StateResult<()> {
        self.file.with_lock(|file| {
            if let Some(current) = Self::read_locked(file)? {
                if id < current {
                    return Err(StateError::CursorRegression {
                        current,
                        attempted: id,
                    });
                }
                if id == current {
                    return Ok(());
                }
            }
            file.write_atomic(&format_cursor(id))
        })
    }
}

/// A failure set persisted as a comma-joined list of incident ids.
///
/// # Thread Safety
///
/// Every mutation reloads the file, applies the change and rewrites it while
/// holding the in-process mutex and the advisory `.lock` file. Adds from the
/// forward loop and removals from the retry loop therefore serialise, both
/// within one process and across processes sharing the file.
#[derive(Debug)]
pub struct FileFailureSet {
    file: StateFile,
}

impl FileFailureSet {
    /// Creates a store for the failure file at `path`.
    #[must_use]
    pub fn open(path: &Path) -> Self {
        Self {
            file: StateFile::new(path),
        }
    }

    /// Returns the path to the failure file.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    fn read_locked(file: &StateFile) -> StateResult<BTreeSet<u64>> {
        Ok(file
            .read()?
            .map(|content| parse_failure_list(&content))
            .unwrap_or_default())
    }

    /// Applies `mutate` to the persisted set and writes it back if it changed.
    fn update(&self, mutate: impl FnOnce(&mut BTreeSet<u64>) -> bool) -> StateResult<bool> {
        self.file.with_lock(|file| {
            let mut ids = Self::read_locked(file)?;
            let changed = mutate(&mut ids);
            if changed {
                file.write_atomic(&format_failure_list(&ids))?;
            }
            Ok(changed)
        })
    }
}

impl FailureStore for FileFailureSet {
    fn load_all(&self) -> StateResult<BTreeSet<u64>> {
        self.file.with_lock(Self::read_locked)
    }

    fn add(&self, id: u64) -> StateResult<bool> {
        self.update(|ids| ids.insert(id))
    }

    fn remove(&self, id: u64) -> StateResult<bool> {
        self.update(|ids| ids.remove(&id))
    }

    fn save_all(&self, ids: &BTreeSet<u64>) -> StateResult<()> {
        self.file
            .with_lock(|file| file.write_atomic(&format_failure_list(ids)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn cursor_missing_file_is_absent() {
        let dir = tempdir().unwrap();
        let store = FileCursorStore::open(&dir.path().join("cursor"));
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn cursor_save_and_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cursor");

        {
            let store = FileCursorStore::open(&path);
            store.save(41).unwrap();
            store.save(42).unwrap();
        }

        let store = FileCursorStore::open(&path);
        assert_eq!(store.load().unwrap(), Some(42));
        assert_eq!(fs::read_to_string(&path).unwrap(), "42");
    }

    #[test]
    fn cursor_rejects_regression() {
        let dir = tempdir().unwrap();
        let store = FileCursorStore::open(&dir.path().join("cursor"));
        store.save(10).unwrap();

        let result = store.save(9);
        assert!(matches!(
            result,
            Err(StateError::CursorRegression {
                current: 10,
                attempted: 9
            })
        ));
        assert_eq!(store.load().unwrap(), Some(10));

        // Saving the same value again is fine.
        store.save(10).unwrap();
    }

    #[test]
    fn cursor_reset_can_lower() {
        let dir = tempdir().unwrap();
        let store = FileCursorStore::open(&dir.path().join("cursor"));
        store.save(500).unwrap();
        store.reset(100).unwrap();
        assert_eq!(store.load().unwrap(), Some(100));
    }

    #[test]
    fn cursor_corrupt_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cursor");
        fs::write(&path, "not-a-number").unwrap();

        let store = FileCursorStore::open(&path);
        assert!(matches!(store.load(), Err(StateError::Corrupted { .. })));
        // A corrupt cursor also blocks advancement.
        assert!(store.save(5).is_err());
    }

    #[test]
    fn failures_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let store = FileFailureSet::open(&dir.path().join("failed"));
        assert!(store.load_all().unwrap().is_empty());
        assert!(!store.remove(3).unwrap());
    }

    #[test]
    fn failures_add_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("failed");
        let store = FileFailureSet::open(&path);

        assert!(store.add(7).unwrap());
        assert!(store.add(5).unwrap());
        assert!(!store.add(7).unwrap());

        assert_eq!(fs::read_to_string(&path).unwrap(), "5,7");
    }

    #[test]
    fn failures_load_tolerates_damage() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("failed");
        fs::write(&path, "5,5,abc,7").unwrap();

        let store = FileFailureSet::open(&path);
        assert_eq!(store.load_all().unwrap(), BTreeSet::from([5, 7]));

        // The next write rewrites a clean list.
        store.remove(5).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "7");
    }

    #[test]
    fn failures_remove_last_leaves_empty_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("failed");
        let store = FileFailureSet::open(&path);

        store.add(1).unwrap();
        assert!(store.remove(1).unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn failures_save_all_replaces() {
        let dir = tempdir().unwrap();
        let store = FileFailureSet::open(&dir.path().join("failed"));
        store.add(1).unwrap();

        store.save_all(&BTreeSet::from([8, 9])).unwrap();
        assert_eq!(store.load_all().unwrap(), BTreeSet::from([8, 9]));
    }
}

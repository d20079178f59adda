//! In-memory stores for testing.

use crate::error::{StateError, StateResult};
use crate::store::{CursorStore, FailureStore};
use parking_lot::RwLock;
use std::collections::BTreeSet;

/// An in-memory cursor store.
///
/// Suitable for unit and integration tests; nothing survives the process.
///
/// # Example
///
/// ```rust
/// use incidentsync_state::{CursorStore, InMemoryCursorStore};
///
/// let cursor = InMemoryCursorStore::with_cursor(9);
/// cursor.save(10).unwrap();
/// assert!(cursor.save(3).is_err());
/// ```
#[derive(Debug, Default)]
pub struct InMemoryCursorStore {
    cursor: RwLock<Option<u64>>,
}

impl InMemoryCursorStore {
    /// Creates an empty (unseeded) cursor store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store seeded with `id`.
    #[must_use]
    pub fn with_cursor(id: u64) -> Self {
        Self {
            cursor: RwLock::new(Some(id)),
        }
    }

    /// Returns the current value without going through the trait.
    #[must_use]
    pub fn current(&self) -> Option<u64> {
        *self.cursor.read()
    }
}

impl CursorStore for InMemoryCursorStore {
    fn load(&self) -> StateResult<Option<u64>> {
        Ok(*self.cursor.read())
    }

    fn save(&self, id: u64) -> StateResult<()> {
        let mut cursor = self.cursor.write();
        if let Some(current) = *cursor {
            if id < current {
                return Err(StateError::CursorRegression {
                    current,
                    attempted: id,
                });
            }
        }
        *cursor = Some(id);
        Ok(())
    }
}

/// An in-memory failure set.
#[derive(Debug, Default)]
pub struct InMemoryFailureSet {
    ids: RwLock<BTreeSet<u64>>,
}

impl InMemoryFailureSet {
    /// Creates an empty failure set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a failure set holding `ids`.
    #[must_use]
    pub fn with_ids(ids: impl IntoIterator<Item = u64>) -> Self {
        Self {
            ids: RwLock::new(ids.into_iter().collect()),
        }
    }
}

impl FailureStore for InMemoryFailureSet {
    fn load_all(&self) -> StateResult<BTreeSet<u64>> {
        Ok(self.ids.read().clone())
    }

    fn add(&self, id: u64) -> StateResult<bool> {
        Ok(self.ids.write().insert(id))
    }

    fn remove(&self, id: u64) -> StateResult<bool> {
        Ok(self.ids.write().remove(&id))
    }

    fn save_all(&self, ids: &BTreeSet<u64>) -> StateResult<()> {
        *self.ids.write() = ids.clone();
        Ok(())
    }
}

//! Store trait definitions.

use crate::error::StateResult;
use std::collections::BTreeSet;

/// Durable storage for the forward-sync cursor.
///
/// The cursor is the id of the last incident the forward loop handed to the
/// ticket sink or explicitly skipped.
///
/// # Invariants
///
/// - `save` is atomic with respect to crashes: `load` never observes a
///   partially written value
/// - The cursor never decreases through `save`
/// - Implementations must be `Send + Sync`
pub trait CursorStore: Send + Sync {
    /// Loads the persisted cursor.
    ///
    /// Returns `None` when no cursor has ever been written. Callers must not
    /// treat `None` as zero.
    ///
    /// # Errors
    ///
    /// Returns an error if the cursor cannot be read or is not a decimal integer.
    fn load(&self) -> StateResult<Option<u64>>;

    /// Persists a new cursor value.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StateError::CursorRegression`] if `id` is lower than
    /// the current cursor, or an I/O error if the write fails.
    fn save(&self, id: u64) -> StateResult<()>;
}

/// Durable set of incident ids whose delivery is pending retry.
///
/// Presence of an id means "delivery was attempted at least once and is not
/// yet resolved". Absence means "never failed" or "resolved".
///
/// Mutations are read-modify-write under mutual exclusion, so an `add` from
/// one task is never lost to a concurrent `remove` or `save_all` from another.
pub trait FailureStore: Send + Sync {
    /// Loads all pending ids.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be read. Malformed
    /// entries are dropped rather than reported.
    fn load_all(&self) -> StateResult<BTreeSet<u64>>;

    /// Adds an id. Returns `true` if it was not already present.
    ///
    /// # Errors
    ///
    /// Returns an error if the set cannot be persisted.
    fn add(&self, id: u64) -> StateResult<bool>;

    /// Removes an id. Returns `true` if it was present.
    ///
    /// Removing an absent id is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the set cannot be persisted.
    fn remove(&self, id: u64) -> StateResult<bool>;

    /// Replaces the whole set atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if the set cannot be persisted.
    fn save_all(&self, ids: &BTreeSet<u64>) -> StateResult<()>;
}

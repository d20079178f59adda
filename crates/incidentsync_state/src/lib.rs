//! # IncidentSync State
//!
//! Durable state for the IncidentSync engine.
//!
//! The engine keeps exactly two pieces of persisted state:
//!
//! - the **cursor**: the highest incident id the forward loop has handed to the
//!   ticket sink (or skipped), stored as a single decimal integer
//! - the **failure set**: incident ids whose delivery failed and are waiting
//!   for the retry loop, stored as a comma-joined list
//!
//! ## Design Principles
//!
//! - Stores sit behind small traits ([`CursorStore`], [`FailureStore`]) so the
//!   loops never touch raw file handles
//! - Writes are atomic: write a temp file, fsync, rename, fsync the directory
//! - Failure-set mutations are read-modify-write under an exclusive lock
//!   (in-process mutex plus advisory file lock)
//! - Must be `Send + Sync`; both loops share the same store instances
//!
//! ## Available Stores
//!
//! - [`FileCursorStore`] / [`FileFailureSet`] - persistent, file-backed
//! - [`InMemoryCursorStore`] / [`InMemoryFailureSet`] - for tests
//!
//! ## Example
//!
//! ```rust
//! use incidentsync_state::{FailureStore, InMemoryFailureSet};
//!
//! let failures = InMemoryFailureSet::new();
//! assert!(failures.add(42).unwrap());
//! assert!(!failures.add(42).unwrap());
//! assert!(failures.remove(42).unwrap());
//! assert!(failures.load_all().unwrap().is_empty());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod file;
mod format;
mod lock;
mod memory;
mod store;

pub use error::{StateError, StateResult};
pub use file::{FileCursorStore, FileFailureSet};
pub use format::{format_cursor, format_failure_list, parse_cursor, parse_failure_list};
pub use memory::{InMemoryCursorStore, InMemoryFailureSet};
pub use store::{CursorStore, FailureStore};

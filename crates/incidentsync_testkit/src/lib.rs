//! # IncidentSync Testkit
//!
//! Test utilities for IncidentSync.
//!
//! This crate provides:
//! - Incident fixtures in the shapes the source returns
//! - Temporary on-disk state (cursor and failure files)
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use incidentsync_testkit::prelude::*;
//!
//! #[test]
//! fn forward_cycle_with_files() {
//!     let state = TempState::with_cursor(9);
//!     let incident = open_incident(10);
//!     // ... build a SyncContext from state.cursor / state.failures
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;

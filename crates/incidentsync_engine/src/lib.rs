//! # IncidentSync Engine
//!
//! Forward sync and retry reconciliation for IncidentSync.
//!
//! This crate provides:
//! - The forward sync loop (cursor → query → deliver → advance)
//! - The retry reconciliation loop over the durable failure set
//! - A supervisor running both loops until interrupted
//! - Source and sink abstractions, with HTTP adapters and in-memory mocks
//! - Per-call timeouts and bounded exponential backoff
//!
//! ## Architecture
//!
//! The two loops never talk to each other. They share only the cursor store
//! and the failure set, both of which serialise their own access:
//!
//! ```text
//! forward:  cursor ─▶ source.query ─▶ sink ─▶ cursor        (success)
//!                                        └──▶ failures ─▶ cursor (failure)
//! retry:    failures ─▶ source.fetch ─▶ sink ─▶ failures.remove
//! ```
//!
//! ## Key Invariants
//!
//! - The cursor never decreases
//! - At most one incident is processed per forward cycle, oldest first
//! - A failed delivery is in the failure set before the cursor moves past it
//! - An id leaves the failure set only after a ticket was created or the
//!   incident is confirmed closed or gone
//! - Delivery is at-least-once: a crash between ticket creation and the
//!   following state write can produce a duplicate ticket

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod context;
mod error;
mod forward;
mod http;
mod reconcile;
mod shutdown;
mod stats;
mod supervisor;
mod transport;

pub use config::{
    poll_interval, EngineConfig, RetryConfig, SinkConfig, SourceConfig, TransportConfig,
    DEFAULT_FORWARD_INTERVAL, DEFAULT_RETRY_INTERVAL, DEFAULT_SOURCE_API_VERSION,
    MIN_POLL_INTERVAL,
};
pub use context::SyncContext;
pub use error::{SyncError, SyncResult};
pub use forward::{ForwardOutcome, ForwardState, ForwardSync};
pub use http::{HttpIncidentSource, HttpTicketSink};
pub use reconcile::{ReconcileReport, RetryReconciler};
pub use shutdown::Shutdown;
pub use stats::LoopStats;
pub use supervisor::Supervisor;
pub use transport::{IncidentSource, MockSink, MockSource, TicketSink};

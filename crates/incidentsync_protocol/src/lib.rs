//! # IncidentSync Protocol
//!
//! Wire types shared by the incident source, the ticket sink and the engine.
//!
//! This crate provides:
//! - [`Incident`] records as returned by the incident source
//! - [`IncidentQuery`] for the one-at-a-time forward query
//! - [`TicketBuilder`] turning an incident into a [`TicketPayload`]
//! - [`CreatedTicket`] as returned by the ticket sink
//!
//! This is a pure crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod incident;
mod query;
mod ticket;

pub use error::{ProtocolError, ProtocolResult};
pub use incident::{Incident, IncidentStatus};
pub use query::{IncidentQuery, ItemRange, SORT_BY_START_TIME};
pub use ticket::{CreatedTicket, TicketBuilder, TicketPayload, DEFAULT_ISSUE_TYPE};

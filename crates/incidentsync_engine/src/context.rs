//! Everything a loop needs to do its work.

use crate::config::EngineConfig;
use crate::error::SyncResult;
use crate::transport::{IncidentSource, TicketSink};
use incidentsync_protocol::{CreatedTicket, Incident, TicketBuilder};
use incidentsync_state::{CursorStore, FailureStore};
use std::sync::Arc;

/// Collaborators and settings shared by the forward and retry loops.
///
/// Built once at startup and cloned into each loop. The loops share nothing
/// mutable except the two stores, which serialise their own access.
#[derive(Clone)]
pub struct SyncContext {
    /// Incident source.
    pub source: Arc<dyn IncidentSource>,
    /// Ticket sink.
    pub sink: Arc<dyn TicketSink>,
    /// Durable cursor.
    pub cursor: Arc<dyn CursorStore>,
    /// Durable failure set.
    pub failures: Arc<dyn FailureStore>,
    /// Payload builder.
    pub tickets: TicketBuilder,
    /// Loop timing.
    pub config: EngineConfig,
}

impl SyncContext {
    /// Creates a context with default loop timing.
    pub fn new(
        source: Arc<dyn IncidentSource>,
        sink: Arc<dyn TicketSink>,
        cursor: Arc<dyn CursorStore>,
        failures: Arc<dyn FailureStore>,
        tickets: TicketBuilder,
    ) -> Self {
        Self {
            source,
            sink,
            cursor,
            failures,
            tickets,
            config: EngineConfig::default(),
        }
    }

    /// Sets the loop timing.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Builds the ticket for `incident` and sends it to the sink.
    pub fn deliver(&self, incident: &Incident) -> SyncResult<CreatedTicket> {
        let payload = self.tickets.build(incident)?;
        self.sink.create_ticket(&payload)
    }
}

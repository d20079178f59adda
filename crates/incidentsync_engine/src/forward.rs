//! The forward sync loop.
//!
//! Each cycle moves the cursor past at most one incident:
//!
//! ```text
//! Idle -> AwaitCursor -> Query -> Select -> Deliver -> Advance -> Idle
//! ```
//!
//! A failed delivery is recorded in the failure set *before* the cursor is
//! advanced past it, so an incident is never skipped without being queued
//! for retry.

use crate::context::SyncContext;
use crate::error::{SyncError, SyncResult};
use crate::shutdown::Shutdown;
use crate::stats::LoopStats;
use incidentsync_protocol::{CreatedTicket, IncidentQuery};
use parking_lot::{Mutex, RwLock};
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, error, info, info_span, warn};

/// The step a forward cycle is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardState {
    /// Between cycles.
    Idle,
    /// Loading the cursor.
    AwaitCursor,
    /// Asking the source for the next incident.
    Query,
    /// Validating the returned incident against the cursor.
    Select,
    /// Building and sending the ticket.
    Deliver,
    /// Persisting the new cursor.
    Advance,
}

/// What one forward cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwardOutcome {
    /// No open incident newer than the cursor.
    Idle {
        /// The unchanged cursor.
        cursor: u64,
    },
    /// A ticket was created and the cursor advanced.
    Delivered {
        /// The incident now behind the cursor.
        incident_id: u64,
        /// The sink's answer.
        ticket: CreatedTicket,
    },
    /// Delivery failed; the id was queued for retry and the cursor advanced.
    Deferred {
        /// The incident now behind the cursor.
        incident_id: u64,
        /// Why delivery failed.
        reason: String,
    },
    /// The source returned an incident that does not lie past the cursor.
    Stale {
        /// The unchanged cursor.
        cursor: u64,
        /// The offending id, if the record had one.
        incident_id: Option<u64>,
    },
}

/// Drives the forward sync loop.
pub struct ForwardSync {
    ctx: SyncContext,
    state: RwLock<ForwardState>,
    stats: RwLock<LoopStats>,
    cycle: Mutex<()>,
}

impl ForwardSync {
    /// Creates the loop.
    pub fn new(ctx: SyncContext) -> Self {
        Self {
            ctx,
            state: RwLock::new(ForwardState::Idle),
            stats: RwLock::new(LoopStats::default()),
            cycle: Mutex::new(()),
        }
    }

    /// Gets the current state.
    pub fn state(&self) -> ForwardState {
        *self.state.read()
    }

    /// Gets the current stats.
    pub fn stats(&self) -> LoopStats {
        self.stats.read().clone()
    }

    fn set_state(&self, state: ForwardState) {
        *self.state.write() = state;
    }

    /// Runs one cycle.
    ///
    /// # Errors
    ///
    /// - [`SyncError::CycleInProgress`] if another cycle is running
    /// - [`SyncError::MissingCursor`] if no cursor has been seeded
    /// - source errors from the query
    /// - state errors; the cursor is not advanced when the failure set cannot
    ///   be written
    pub fn run_cycle(&self) -> SyncResult<ForwardOutcome> {
        let _guard = self.cycle.try_lock().ok_or(SyncError::CycleInProgress)?;

        let result = self.cycle();
        self.set_state(ForwardState::Idle);

        let mut stats = self.stats.write();
        stats.finish_cycle();
        match &result {
            Ok(ForwardOutcome::Idle { .. }) => stats.idle += 1,
            Ok(ForwardOutcome::Delivered { .. }) => stats.delivered += 1,
            Ok(ForwardOutcome::Deferred { .. }) => stats.deferred += 1,
            Ok(ForwardOutcome::Stale { .. }) => stats.stale += 1,
            Err(e) => stats.record_error(e),
        }
        result
    }

    fn cycle(&self) -> SyncResult<ForwardOutcome> {
        self.set_state(ForwardState::AwaitCursor);
        let cursor = self.ctx.cursor.load()?.ok_or(SyncError::MissingCursor)?;

        self.set_state(ForwardState::Query);
        let incidents = self.ctx.source.query(&IncidentQuery::open_after(cursor))?;

        self.set_state(ForwardState::Select);
        let Some(incident) = incidents.into_iter().next() else {
            debug!(cursor, "no new incidents");
            return Ok(ForwardOutcome::Idle { cursor });
        };
        let id = match incident.id {
            Some(id) if id > cursor => id,
            other => {
                warn!(
                    cursor,
                    incident_id = ?other,
                    "source returned an incident at or below the cursor; cursor not advanced"
                );
                return Ok(ForwardOutcome::Stale {
                    cursor,
                    incident_id: other,
                });
            }
        };

        self.set_state(ForwardState::Deliver);
        match self.ctx.deliver(&incident) {
            Ok(ticket) => {
                self.set_state(ForwardState::Advance);
                self.ctx.cursor.save(id)?;
                info!(incident_id = id, ticket = ticket.label(), "created ticket");
                Ok(ForwardOutcome::Delivered {
                    incident_id: id,
                    ticket,
                })
            }
            Err(e) => {
                warn!(incident_id = id, error = %e, "ticket creation failed; queued for retry");
                self.ctx.failures.add(id)?;
                self.set_state(ForwardState::Advance);
                self.ctx.cursor.save(id)?;
                Ok(ForwardOutcome::Deferred {
                    incident_id: id,
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Runs cycles until `shutdown` is triggered.
    ///
    /// Errors and panics inside a cycle are logged and counted; the loop
    /// itself only returns on shutdown.
    pub fn run(&self, shutdown: &Shutdown) {
        let span = info_span!("forward_sync");
        let _enter = span.enter();
        info!(
            interval_secs = self.ctx.config.forward_interval.as_secs(),
            "forward sync loop started"
        );

        while !shutdown.is_triggered() {
            match panic::catch_unwind(AssertUnwindSafe(|| self.run_cycle())) {
                Ok(Ok(_)) => {}
                Ok(Err(SyncError::MissingCursor)) => {
                    error!("no cursor found; seed it with `incidentsync seed <ID>`");
                }
                Ok(Err(e)) => error!(error = %e, "forward cycle failed"),
                Err(payload) => {
                    self.set_state(ForwardState::Idle);
                    let message = self.stats.write().record_panic(payload.as_ref());
                    error!(panic = %message, "forward cycle panicked");
                }
            }

            if shutdown.wait(self.ctx.config.forward_interval) {
                break;
            }
        }

        info!("forward sync loop stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{MockSink, MockSource, TicketSink};
    use incidentsync_protocol::{Incident, IncidentStatus, TicketBuilder, TicketPayload};
    use incidentsync_state::{
        CursorStore, FailureStore, InMemoryCursorStore, InMemoryFailureSet,
    };
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    struct Harness {
        source: Arc<MockSource>,
        sink: Arc<MockSink>,
        cursor: Arc<InMemoryCursorStore>,
        failures: Arc<InMemoryFailureSet>,
        forward: ForwardSync,
    }

    fn open(id: u64) -> Incident {
        Incident::new(id, IncidentStatus::Open)
            .with_description(format!("incident {id}"))
            .with_times(id as i64 * 1000, id as i64 * 1000)
    }

    fn harness(cursor: Option<u64>, incidents: Vec<Incident>) -> Harness {
        let source = Arc::new(MockSource::with_incidents(incidents));
        let sink = Arc::new(MockSink::new());
        let cursor = Arc::new(match cursor {
            Some(c) => InMemoryCursorStore::with_cursor(c),
            None => InMemoryCursorStore::new(),
        });
        let failures = Arc::new(InMemoryFailureSet::new());
        let ctx = SyncContext::new(
            source.clone(),
            sink.clone(),
            cursor.clone(),
            failures.clone(),
            TicketBuilder::new("SEC"),
        );
        Harness {
            source,
            sink,
            cursor,
            failures,
            forward: ForwardSync::new(ctx),
        }
    }

    #[test]
    fn delivers_and_advances() {
        let h = harness(Some(9), vec![open(10)]);

        let outcome = h.forward.run_cycle().unwrap();
        assert!(matches!(outcome, ForwardOutcome::Delivered { incident_id: 10, .. }));
        assert_eq!(h.cursor.load().unwrap(), Some(10));
        assert_eq!(h.sink.created_ids(), vec![10]);
        assert!(h.failures.load_all().unwrap().is_empty());
        assert_eq!(h.forward.state(), ForwardState::Idle);
        assert_eq!(h.forward.stats().delivered, 1);
    }

    #[test]
    fn failed_delivery_is_queued_then_cursor_advances() {
        let h = harness(Some(9), vec![open(10)]);
        h.sink.fail_for(10);

        let outcome = h.forward.run_cycle().unwrap();
        assert!(matches!(outcome, ForwardOutcome::Deferred { incident_id: 10, .. }));
        assert_eq!(h.cursor.load().unwrap(), Some(10));
        assert!(h.failures.load_all().unwrap().contains(&10));
    }

    #[test]
    fn malformed_incident_is_a_delivery_failure() {
        let mut broken = open(10);
        broken.description = None;
        let h = harness(Some(9), vec![broken]);

        let outcome = h.forward.run_cycle().unwrap();
        match outcome {
            ForwardOutcome::Deferred { reason, .. } => assert!(reason.contains("description")),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(h.sink.calls(), 0);
        assert!(h.failures.load_all().unwrap().contains(&10));
    }

    #[test]
    fn missing_cursor_has_no_side_effects() {
        let h = harness(None, vec![open(10)]);

        assert!(matches!(h.forward.run_cycle(), Err(SyncError::MissingCursor)));
        assert!(h.source.queries().is_empty());
        assert_eq!(h.sink.calls(), 0);
        assert_eq!(h.forward.stats().errors, 1);
    }

    #[test]
    fn empty_result_is_idle() {
        let h = harness(Some(50), vec![open(10)]);

        assert_eq!(h.forward.run_cycle().unwrap(), ForwardOutcome::Idle { cursor: 50 });
        assert_eq!(h.cursor.load().unwrap(), Some(50));
    }

    #[test]
    fn stale_result_does_not_advance() {
        let h = harness(Some(50), vec![]);
        h.source.set_query_override(vec![open(40)]);

        let outcome = h.forward.run_cycle().unwrap();
        assert_eq!(
            outcome,
            ForwardOutcome::Stale {
                cursor: 50,
                incident_id: Some(40)
            }
        );
        assert_eq!(h.cursor.load().unwrap(), Some(50));
        assert_eq!(h.sink.calls(), 0);
    }

    #[test]
    fn query_error_leaves_state_untouched() {
        let h = harness(Some(9), vec![open(10)]);
        h.source.set_query_error(Some("connection refused"));

        assert!(matches!(h.forward.run_cycle(), Err(SyncError::Source { .. })));
        assert_eq!(h.cursor.load().unwrap(), Some(9));
    }

    struct PanickingSink;

    impl TicketSink for PanickingSink {
        fn create_ticket(&self, _payload: &TicketPayload) -> SyncResult<CreatedTicket> {
            panic!("sink exploded");
        }
    }

    #[test]
    fn run_survives_panicking_cycles() {
        let ctx = SyncContext::new(
            Arc::new(MockSource::with_incidents([open(10)])),
            Arc::new(PanickingSink),
            Arc::new(InMemoryCursorStore::with_cursor(9)),
            Arc::new(InMemoryFailureSet::new()),
            TicketBuilder::new("SEC"),
        );
        let forward = Arc::new(ForwardSync::new(ctx));
        let shutdown = Shutdown::new();

        let handle = {
            let forward = forward.clone();
            let shutdown = shutdown.clone();
            thread::spawn(move || forward.run(&shutdown))
        };
        thread::sleep(Duration::from_millis(50));
        shutdown.trigger();
        handle.join().unwrap();

        let stats = forward.stats();
        assert!(stats.errors >= 1);
        assert!(stats.last_error.unwrap().contains("sink exploded"));
        assert_eq!(forward.state(), ForwardState::Idle);
    }
}

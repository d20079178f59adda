//! The retry reconciliation loop.
//!
//! Works through the failure set one id at a time. For each pending id the
//! current incident is re-fetched: open incidents are delivered again, while
//! closed, hidden or vanished incidents are dropped without a ticket. An id
//! only leaves the failure set once one of those resolutions is confirmed.

use crate::context::SyncContext;
use crate::error::{SyncError, SyncResult};
use crate::shutdown::Shutdown;
use crate::stats::LoopStats;
use incidentsync_protocol::CreatedTicket;
use parking_lot::{Mutex, RwLock};
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, error, info, info_span, warn};

/// What one reconciliation cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Ids whose ticket was created and which left the failure set.
    pub delivered: Vec<u64>,
    /// Ids dropped because the incident is no longer open or no longer exists.
    pub discarded: Vec<u64>,
    /// Ids still in the failure set after this cycle.
    pub pending: Vec<u64>,
    /// Per-id failures encountered during this cycle.
    pub errors: Vec<(u64, String)>,
}

impl ReconcileReport {
    /// Returns true if the cycle found nothing to retry.
    pub fn is_empty(&self) -> bool {
        self.delivered.is_empty()
            && self.discarded.is_empty()
            && self.pending.is_empty()
            && self.errors.is_empty()
    }

    /// Number of ids that left the failure set.
    pub fn resolved(&self) -> usize {
        self.delivered.len() + self.discarded.len()
    }
}

enum Resolution {
    Delivered(CreatedTicket),
    Discarded,
    StillFailing(String),
}

/// Drives the retry reconciliation loop.
pub struct RetryReconciler {
    ctx: SyncContext,
    stats: RwLock<LoopStats>,
    cycle: Mutex<()>,
}

impl RetryReconciler {
    /// Creates the loop.
    pub fn new(ctx: SyncContext) -> Self {
        Self {
            ctx,
            stats: RwLock::new(LoopStats::default()),
            cycle: Mutex::new(()),
        }
    }

    /// Gets the current stats.
    pub fn stats(&self) -> LoopStats {
        self.stats.read().clone()
    }

    /// Runs one cycle over every pending id.
    pub fn run_cycle(&self) -> SyncResult<ReconcileReport> {
        self.run_cycle_until(&Shutdown::new())
    }

    /// Runs one cycle, stopping between ids once `shutdown` is triggered.
    ///
    /// # Errors
    ///
    /// Fails only if the failure set cannot be read or another cycle is
    /// running. Errors for individual ids are logged and reported in
    /// [`ReconcileReport::errors`].
    pub fn run_cycle_until(&self, shutdown: &Shutdown) -> SyncResult<ReconcileReport> {
        let _guard = self.cycle.try_lock().ok_or(SyncError::CycleInProgress)?;

        let result = self.cycle(shutdown);

        let mut stats = self.stats.write();
        stats.finish_cycle();
        match &result {
            Ok(report) if report.is_empty() => stats.idle += 1,
            Ok(report) => {
                stats.delivered += report.delivered.len() as u64;
                stats.discarded += report.discarded.len() as u64;
                for (_, message) in &report.errors {
                    stats.record_error(message);
                }
            }
            Err(e) => stats.record_error(e),
        }
        result
    }

    fn cycle(&self, shutdown: &Shutdown) -> SyncResult<ReconcileReport> {
        let pending = self.ctx.failures.load_all()?;
        let mut report = ReconcileReport::default();

        if pending.is_empty() {
            debug!("no failed incidents to retry");
            return Ok(report);
        }
        info!(count = pending.len(), "retrying failed incidents");

        let mut ids = pending.into_iter();
        for id in ids.by_ref() {
            if shutdown.is_triggered() {
                report.pending.push(id);
                break;
            }

            match self.reconcile_one(id) {
                Ok(Resolution::Delivered(ticket)) => {
                    info!(incident_id = id, ticket = ticket.label(), "created ticket on retry");
                    report.delivered.push(id);
                }
                Ok(Resolution::Discarded) => report.discarded.push(id),
                Ok(Resolution::StillFailing(reason)) => {
                    report.pending.push(id);
                    report.errors.push((id, reason));
                }
                Err(e) => {
                    error!(incident_id = id, error = %e, "retry failed");
                    report.pending.push(id);
                    report.errors.push((id, e.to_string()));
                }
            }
        }
        report.pending.extend(ids);

        info!(
            delivered = report.delivered.len(),
            discarded = report.discarded.len(),
            pending = report.pending.len(),
            "retry cycle finished"
        );
        Ok(report)
    }

    fn reconcile_one(&self, id: u64) -> SyncResult<Resolution> {
        let Some(incident) = self.ctx.source.fetch(id)? else {
            self.ctx.failures.remove(id)?;
            info!(incident_id = id, "incident no longer exists; dropped from retry queue");
            return Ok(Resolution::Discarded);
        };

        if !incident.is_open() {
            self.ctx.failures.remove(id)?;
            info!(
                incident_id = id,
                status = ?incident.status,
                "incident no longer open; dropped from retry queue"
            );
            return Ok(Resolution::Discarded);
        }

        match self.ctx.deliver(&incident) {
            Ok(ticket) => {
                if let Err(e) = self.ctx.failures.remove(id) {
                    // The ticket exists; the next cycle will create it again.
                    error!(incident_id = id, ticket = ticket.label(), error = %e,
                        "ticket created but id could not be removed from retry queue");
                    return Err(e.into());
                }
                Ok(Resolution::Delivered(ticket))
            }
            Err(e) => {
                warn!(incident_id = id, error = %e, "ticket creation failed again; kept for retry");
                Ok(Resolution::StillFailing(e.to_string()))
            }
        }
    }

    /// Runs cycles until `shutdown` is triggered.
    pub fn run(&self, shutdown: &Shutdown) {
        let span = info_span!("retry_reconcile");
        let _enter = span.enter();
        info!(
            interval_secs = self.ctx.config.retry_interval.as_secs(),
            "retry reconciliation loop started"
        );

        while !shutdown.is_triggered() {
            match panic::catch_unwind(AssertUnwindSafe(|| self.run_cycle_until(shutdown))) {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => error!(error = %e, "retry cycle failed"),
                Err(payload) => {
                    let message = self.stats.write().record_panic(payload.as_ref());
                    error!(panic = %message, "retry cycle panicked");
                }
            }

            if shutdown.wait(self.ctx.config.retry_interval) {
                break;
            }
        }

        info!("retry reconciliation loop stopped");
    }
}

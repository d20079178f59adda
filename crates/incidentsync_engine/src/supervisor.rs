//! Runs both loops side by side until interrupted.

use crate::context::SyncContext;
use crate::error::SyncResult;
use crate::forward::ForwardSync;
use crate::reconcile::RetryReconciler;
use crate::shutdown::Shutdown;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinError, JoinHandle};
use tracing::{error, info, warn};

/// How long loops may keep running after an interrupt by default.
const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Owns the forward and retry loops and the shutdown signal they share.
pub struct Supervisor {
    forward: Arc<ForwardSync>,
    reconciler: Arc<RetryReconciler>,
    shutdown: Shutdown,
    grace: Duration,
}

impl Supervisor {
    /// Creates a supervisor for both loops over the same context.
    pub fn new(ctx: SyncContext) -> Self {
        Self {
            forward: Arc::new(ForwardSync::new(ctx.clone())),
            reconciler: Arc::new(RetryReconciler::new(ctx)),
            shutdown: Shutdown::new(),
            grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }

    /// Sets how long to wait for busy loops once interrupted.
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Returns a handle that stops both loops when triggered.
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Returns the forward loop.
    pub fn forward(&self) -> &Arc<ForwardSync> {
        &self.forward
    }

    /// Returns the retry loop.
    pub fn reconciler(&self) -> &Arc<RetryReconciler> {
        &self.reconciler
    }

    /// Runs both loops until Ctrl-C.
    pub async fn run(&self) -> SyncResult<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "cannot listen for interrupts; running until killed");
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Runs both loops until they exit or `interrupt` completes.
    ///
    /// Each loop runs on its own blocking thread. When `interrupt` resolves the
    /// shared [`Shutdown`] is triggered; loops notice it at their next cycle
    /// boundary or sleep. Loops still busy with a network call after the
    /// shutdown grace are left running and this returns anyway. A loop that
    /// dies does not stop the other one.
    pub async fn run_until<F>(&self, interrupt: F) -> SyncResult<()>
    where
        F: Future<Output = ()>,
    {
        let mut forward: JoinHandle<()> = {
            let forward = Arc::clone(&self.forward);
            let shutdown = self.shutdown.clone();
            tokio::task::spawn_blocking(move || forward.run(&shutdown))
        };
        let mut retry: JoinHandle<()> = {
            let reconciler = Arc::clone(&self.reconciler);
            let shutdown = self.shutdown.clone();
            tokio::task::spawn_blocking(move || reconciler.run(&shutdown))
        };
        info!("supervisor started forward and retry loops");

        tokio::pin!(interrupt);
        let mut forward_done = false;
        let mut retry_done = false;

        while !(forward_done && retry_done) {
            tokio::select! {
                result = &mut forward, if !forward_done => {
                    forward_done = true;
                    log_exit("forward_sync", result);
                }
                result = &mut retry, if !retry_done => {
                    retry_done = true;
                    log_exit("retry_reconcile", result);
                }
                _ = &mut interrupt => {
                    info!("interrupt received; stopping loops");
                    self.shutdown.trigger();
                    break;
                }
            }
        }

        if !(forward_done && retry_done) {
            let drain = async {
                if !forward_done {
                    log_exit("forward_sync", (&mut forward).await);
                }
                if !retry_done {
                    log_exit("retry_reconcile", (&mut retry).await);
                }
            };
            if tokio::time::timeout(self.grace, drain).await.is_err() {
                warn!(
                    grace_ms = self.grace.as_millis() as u64,
                    "loops still busy after shutdown grace; abandoning in-flight work"
                );
            }
        }

        info!("supervisor stopped");
        Ok(())
    }
}

fn log_exit(name: &str, result: Result<(), JoinError>) {
    match result {
        Ok(()) => info!(task = name, "loop exited"),
        Err(e) => error!(task = name, error = %e, "loop task died"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{MockSink, MockSource, TicketSink};
    use incidentsync_protocol::{
        CreatedTicket, Incident, IncidentStatus, TicketBuilder, TicketPayload,
    };
    use incidentsync_state::{CursorStore, InMemoryCursorStore, InMemoryFailureSet};
    use std::time::Duration;

    #[tokio::test]
    async fn stops_both_loops_on_interrupt() {
        let incident = Incident::new(10, IncidentStatus::Open)
            .with_description("Port scan")
            .with_times(0, 0);
        let cursor = Arc::new(InMemoryCursorStore::with_cursor(9));
        let supervisor = Supervisor::new(SyncContext::new(
            Arc::new(MockSource::with_incidents([incident])),
            Arc::new(MockSink::new()),
            cursor.clone(),
            Arc::new(InMemoryFailureSet::new()),
            TicketBuilder::new("SEC"),
        ));

        supervisor
            .run_until(tokio::time::sleep(Duration::from_millis(100)))
            .await
            .unwrap();

        assert!(supervisor.shutdown_handle().is_triggered());
        assert_eq!(cursor.load().unwrap(), Some(10));
        assert!(supervisor.forward().stats().cycles >= 1);
        assert!(supervisor.reconciler().stats().cycles >= 1);
    }

    /// A sink stuck on a slow network call.
    struct StalledSink(Duration);

    impl TicketSink for StalledSink {
        fn create_ticket(&self, _payload: &TicketPayload) -> SyncResult<CreatedTicket> {
            std::thread::sleep(self.0);
            Ok(CreatedTicket::default())
        }
    }

    #[tokio::test]
    async fn interrupt_does_not_wait_for_stalled_delivery() {
        let incident = Incident::new(10, IncidentStatus::Open)
            .with_description("Port scan")
            .with_times(0, 0);
        let supervisor = Supervisor::new(SyncContext::new(
            Arc::new(MockSource::with_incidents([incident])),
            Arc::new(StalledSink(Duration::from_secs(3))),
            Arc::new(InMemoryCursorStore::with_cursor(9)),
            Arc::new(InMemoryFailureSet::new()),
            TicketBuilder::new("SEC"),
        ))
        .with_shutdown_grace(Duration::from_millis(200));

        let started = std::time::Instant::now();
        supervisor
            .run_until(tokio::time::sleep(Duration::from_millis(100)))
            .await
            .unwrap();

        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(supervisor.shutdown_handle().is_triggered());
    }
}

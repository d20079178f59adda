//! Per-loop counters.

use std::any::Any;
use std::time::Instant;

/// Statistics about one loop.
#[derive(Debug, Clone, Default)]
pub struct LoopStats {
    /// Cycles run, whatever their outcome.
    pub cycles: u64,
    /// Tickets created.
    pub delivered: u64,
    /// Forward deliveries that failed and were handed to the retry loop.
    pub deferred: u64,
    /// Ids dropped by the retry loop because the incident is closed or gone.
    pub discarded: u64,
    /// Cycles that found nothing to do.
    pub idle: u64,
    /// Cycles where the source returned an incident at or below the cursor.
    pub stale: u64,
    /// Cycles or per-id attempts that ended in an error.
    pub errors: u64,
    /// Most recent error message.
    pub last_error: Option<String>,
    /// When the most recent cycle finished.
    pub last_cycle: Option<Instant>,
}

impl LoopStats {
    pub(crate) fn finish_cycle(&mut self) {
        self.cycles += 1;
        self.last_cycle = Some(Instant::now());
    }

    pub(crate) fn record_error(&mut self, error: impl ToString) {
        self.errors += 1;
        self.last_error = Some(error.to_string());
    }

    /// Records a caught panic as an error and returns its message.
    pub(crate) fn record_panic(&mut self, payload: &(dyn Any + Send)) -> String {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        self.record_error(format!("panic: {message}"));
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_payloads_are_recorded() {
        let mut stats = LoopStats::default();
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(stats.record_panic(payload.as_ref()), "boom");

        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(stats.record_panic(payload.as_ref()), "bang");

        let payload: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(stats.record_panic(payload.as_ref()), "unknown panic");

        assert_eq!(stats.errors, 3);
        assert_eq!(stats.last_error.as_deref(), Some("panic: unknown panic"));
    }
}

//! Cooperative shutdown signal shared by both loops.

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A cloneable, one-shot stop signal.
///
/// Loops sleep with [`Shutdown::wait`] so a trigger wakes them immediately
/// instead of after a full poll interval. Work already in flight (a network
/// call, a state write) is never interrupted.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    triggered: Mutex<bool>,
    condvar: Condvar,
}

impl Shutdown {
    /// Creates an untriggered signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Triggers the signal and wakes every waiter.
    pub fn trigger(&self) {
        let mut triggered = self.inner.triggered.lock();
        *triggered = true;
        self.inner.condvar.notify_all();
    }

    /// Returns true once the signal has been triggered.
    pub fn is_triggered(&self) -> bool {
        *self.inner.triggered.lock()
    }

    /// Sleeps for `timeout` or until triggered.
    ///
    /// Returns true if the signal was triggered.
    pub fn wait(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut triggered = self.inner.triggered.lock();
        while !*triggered {
            if self
                .inner
                .condvar
                .wait_until(&mut triggered, deadline)
                .timed_out()
            {
                break;
            }
        }
        *triggered
    }
}

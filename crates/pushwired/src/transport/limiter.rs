//! Admission gate bounding concurrently running connection handlers.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Counts active handlers and refuses admission beyond a fixed capacity.
#[derive(Debug)]
pub(crate) struct ConnectionLimiter {
    capacity: usize,
    active: Mutex<usize>,
    released: Condvar,
}

impl ConnectionLimiter {
    /// Builds a limiter admitting at most `capacity` handlers (minimum one).
    pub(crate) fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            capacity: capacity.max(1),
            active: Mutex::new(0),
            released: Condvar::new(),
        })
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    /// Takes a slot if one is free. The slot is returned when the permit drops.
    pub(crate) fn try_acquire(self: &Arc<Self>) -> Option<ConnectionPermit> {
        let mut active = self.lock();
        if *active >= self.capacity {
            return None;
        }
        *active += 1;
        Some(ConnectionPermit {
            limiter: Arc::clone(self),
        })
    }

    /// Number of permits currently held.
    pub(crate) fn active(&self) -> usize {
        *self.lock()
    }

    /// Blocks until every permit is released or `timeout` elapses.
    ///
    /// Returns `true` when no handlers remain active.
    pub(crate) fn wait_idle(&self, timeout: Duration) -> bool {
        let guard = self.lock();
        let (active, _) = self
            .released
            .wait_timeout_while(guard, timeout, |active| *active > 0)
            .unwrap_or_else(PoisonError::into_inner);
        *active == 0
    }

    fn lock(&self) -> MutexGuard<'_, usize> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn release(&self) {
        let mut active = self.lock();
        *active = active.saturating_sub(1);
        drop(active);
        self.released.notify_all();
    }
}

/// Slot held by one running connection handler.
#[derive(Debug)]
pub(crate) struct ConnectionPermit {
    limiter: Arc<ConnectionLimiter>,
}

impl Drop for ConnectionPermit {
    fn drop(&mut self) {
        self.limiter.release();
    }
}

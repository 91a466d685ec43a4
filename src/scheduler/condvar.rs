//! Condition variables against the global kernel lock
//!
//! Every blocking point in the kernel (pipe read/write, wait-for-child,
//! join, connect, accept) suspends on one of these. Waiting atomically
//! releases the kernel lock and reacquires it before returning, so all
//! shared records stay protected by the single lock. Wakeups are hints
//! only: callers must re-check their predicate after every return.

use std::sync::Arc;
use std::time::Duration;

use crate::kernel::KernelGuard;

/// A condition variable tied to the global kernel lock.
///
/// Cloning is cheap and shares the underlying queue; records embed a
/// `CondVar` and waiters clone it out before releasing their borrow of the
/// record.
#[derive(Clone)]
pub struct CondVar {
    inner: Arc<parking_lot::Condvar>,
}

impl CondVar {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(parking_lot::Condvar::new()),
        }
    }

    /// Block until signalled, releasing the kernel lock while suspended.
    pub fn wait(&self, guard: &mut KernelGuard) {
        self.inner.wait(guard);
    }

    /// Block until signalled or `timeout` elapses. Returns true when the
    /// wait timed out. A true result does not mean the awaited event did
    /// not happen: re-check the predicate.
    pub fn wait_timeout(&self, guard: &mut KernelGuard, timeout: Duration) -> bool {
        self.inner.wait_for(guard, timeout).timed_out()
    }

    /// Wake one waiter.
    pub fn signal(&self) {
        self.inner.notify_one();
    }

    /// Wake all waiters.
    pub fn broadcast(&self) {
        self.inner.notify_all();
    }
}

impl Default for CondVar {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CondVar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CondVar")
    }
}

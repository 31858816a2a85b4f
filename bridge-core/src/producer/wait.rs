//! Blocking handle for [`Producer::wait`](super::Producer::wait).

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use super::Subscription;

/// Shared slot a pending wait is resolved through.
pub(crate) struct WaitSlot<R> {
    result: Mutex<Option<R>>,
    ready: Condvar,
}

impl<R> WaitSlot<R> {
    pub(crate) fn resolve(&self, value: R) {
        *self.result.lock() = Some(value);
        self.ready.notify_all();
    }
}

/// A selection the caller is waiting on.
///
/// Resolves once with the first selected value that passed the predicate.
/// Dropping an unresolved `Wait` releases its subscription.
pub struct Wait<R> {
    slot: Arc<WaitSlot<R>>,
    _subscription: Subscription,
}

impl<R> Wait<R> {
    /// A wait that is already resolved.
    pub(crate) fn resolved(value: R) -> Self {
        Self {
            slot: Arc::new(WaitSlot {
                result: Mutex::new(Some(value)),
                ready: Condvar::new(),
            }),
            _subscription: Subscription::noop(),
        }
    }

    /// A wait resolved later through the slot handed to `subscribe`.
    pub(crate) fn pending<F>(subscribe: F) -> Self
    where
        F: FnOnce(Arc<WaitSlot<R>>) -> Subscription,
    {
        let slot = Arc::new(WaitSlot {
            result: Mutex::new(None),
            ready: Condvar::new(),
        });
        let subscription = subscribe(Arc::clone(&slot));
        Self {
            slot,
            _subscription: subscription,
        }
    }

    /// Check if a value is available.
    pub fn is_ready(&self) -> bool {
        self.slot.result.lock().is_some()
    }

    /// Take the value if it has arrived.
    pub fn try_take(&self) -> Option<R> {
        self.slot.result.lock().take()
    }

    /// Block the current thread until the value arrives.
    pub fn block(self) -> R {
        let mut result = self.slot.result.lock();
        loop {
            if let Some(value) = result.take() {
                return value;
            }
            self.slot.ready.wait(&mut result);
        }
    }

    /// Block for at most `timeout`. Returns `None` if nothing arrived.
    pub fn block_timeout(&self, timeout: Duration) -> Option<R> {
        let deadline = Instant::now() + timeout;
        let mut result = self.slot.result.lock();
        loop {
            if let Some(value) = result.take() {
                return Some(value);
            }
            if self.slot.ready.wait_until(&mut result, deadline).timed_out() {
                return result.take();
            }
        }
    }
}

impl<R> fmt::Debug for Wait<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wait")
            .field("ready", &self.is_ready())
            .finish()
    }
}

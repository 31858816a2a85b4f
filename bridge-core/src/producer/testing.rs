//! In-memory producer for unit tests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::{Listener, Producer, Subscription};

type Listeners<S> = Mutex<Vec<(u64, Arc<Listener<S>>)>>;

/// Holds a state value and notifies listeners synchronously on `set_state`.
pub(crate) struct TestProducer<S> {
    state: Mutex<S>,
    listeners: Arc<Listeners<S>>,
    next_id: AtomicU64,
}

impl<S> TestProducer<S>
where
    S: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(initial: S) -> Self {
        Self {
            state: Mutex::new(initial),
            listeners: Arc::new(Mutex::new(Vec::new())),
            next_id: AtomicU64::new(0),
        }
    }

    /// Call every listener with `(next, prev)` without touching the state.
    pub(crate) fn deliver(&self, next: &S, prev: &S) {
        let listeners: Vec<_> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(next, prev);
        }
    }

    pub(crate) fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }
}

impl<S> Producer for TestProducer<S>
where
    S: Clone + Send + Sync + 'static,
{
    type State = S;

    fn get_state(&self) -> S {
        self.state.lock().clone()
    }

    fn set_state(&self, state: S) {
        let prev = std::mem::replace(&mut *self.state.lock(), state.clone());
        self.deliver(&state, &prev);
    }

    fn subscribe(&self, listener: Listener<S>) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().push((id, Arc::new(listener)));

        let listeners = Arc::downgrade(&self.listeners);
        Subscription::new(move || {
            if let Some(listeners) = listeners.upgrade() {
                listeners.lock().retain(|(other, _)| *other != id);
            }
        })
    }
}

//! Producer Contract
//!
//! A Producer is an external state container. Selectors only read the
//! current state and listen for change notifications, but the contract
//! carries the rest of the container's surface as well: wholesale
//! replacement, projected and one-shot subscriptions, waiting on a
//! projection, flushing and teardown. Actions and their middleware chain
//! are described in [`broadcast`].
//!
//! # Notifications
//!
//! A listener receives `(next_state, prev_state)` for every committed
//! transition, in the order the producer serializes them. Registering a
//! listener yields a [`Subscription`]; releasing it must guarantee the
//! listener is never called again.

pub mod broadcast;
#[cfg(test)]
pub(crate) mod testing;
mod wait;

pub use wait::Wait;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

/// Callback invoked with `(next_state, prev_state)` on every transition.
pub type Listener<S> = Box<dyn Fn(&S, &S) + Send + Sync>;

/// A state container the bridge can observe.
///
/// `State` should be cheap to clone. Producers that replace their state
/// wholesale usually hand out an `Arc` of it.
///
/// Implementors supply the state slot and the raw subscription. The
/// selected, one-shot and waiting variants are built on top of `subscribe`.
pub trait Producer: Send + Sync {
    /// The state type held by the producer.
    type State: Send + Sync + 'static;

    /// Get the latest committed state.
    fn get_state(&self) -> Self::State;

    /// Replace the state wholesale and notify listeners.
    fn set_state(&self, state: Self::State);

    /// Register a listener for state transitions.
    fn subscribe(&self, listener: Listener<Self::State>) -> Subscription;

    /// Deliver pending notifications now.
    ///
    /// Producers that notify synchronously have nothing to flush.
    fn flush(&self) {}

    /// Stop notifying and release every listener.
    fn destroy(&self) {}

    /// Listen to a projection of the state.
    ///
    /// `listener(next, prev)` runs when the projection changes and
    /// `predicate(next, prev)` accepts the change.
    fn subscribe_selected<R, F, Q, L>(&self, selector: F, predicate: Q, listener: L) -> Subscription
    where
        Self: Sized,
        R: PartialEq,
        F: Fn(&Self::State) -> R + Send + Sync + 'static,
        Q: Fn(&R, &R) -> bool + Send + Sync + 'static,
        L: Fn(&R, &R) + Send + Sync + 'static,
    {
        self.subscribe(Box::new(move |next_state: &Self::State, prev_state: &Self::State| {
            let next = selector(next_state);
            let prev = selector(prev_state);
            if next != prev && predicate(&next, &prev) {
                listener(&next, &prev);
            }
        }))
    }

    /// Like [`subscribe_selected`](Producer::subscribe_selected), but the
    /// listener runs at most once and the subscription then releases itself.
    ///
    /// Dropping the returned handle before that cancels it.
    fn once<R, F, Q, L>(&self, selector: F, predicate: Q, listener: L) -> Subscription
    where
        Self: Sized,
        R: PartialEq,
        F: Fn(&Self::State) -> R + Send + Sync + 'static,
        Q: Fn(&R, &R) -> bool + Send + Sync + 'static,
        L: FnOnce(&R, &R) + Send + 'static,
    {
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let fired = Arc::new(AtomicBool::new(false));
        let listener = Mutex::new(Some(listener));

        let inner = self.subscribe_selected(selector, predicate, {
            let slot = Arc::clone(&slot);
            let fired = Arc::clone(&fired);
            move |next: &R, prev: &R| {
                if fired.swap(true, Ordering::SeqCst) {
                    return;
                }
                let listener = listener.lock().take();
                if let Some(listener) = listener {
                    listener(next, prev);
                }
                let subscription = slot.lock().take();
                drop(subscription);
            }
        });

        *slot.lock() = Some(inner);
        if fired.load(Ordering::SeqCst) {
            let subscription = slot.lock().take();
            drop(subscription);
        }

        Subscription::new(move || {
            let subscription = slot.lock().take();
            drop(subscription);
        })
    }

    /// Wait for the projection to produce a value accepted by `predicate`.
    ///
    /// Resolves immediately if the current state already qualifies.
    fn wait<R, F, Q>(&self, selector: F, predicate: Q) -> Wait<R>
    where
        Self: Sized,
        R: Clone + PartialEq + Send + 'static,
        F: Fn(&Self::State) -> R + Send + Sync + 'static,
        Q: Fn(&R) -> bool + Send + Sync + 'static,
    {
        let current = selector(&self.get_state());
        if predicate(&current) {
            return Wait::resolved(current);
        }

        Wait::pending(|slot| {
            self.once(
                selector,
                move |next: &R, _: &R| predicate(next),
                move |next: &R, _: &R| slot.resolve(next.clone()),
            )
        })
    }
}

impl<P> Producer for Arc<P>
where
    P: Producer + ?Sized,
{
    type State = P::State;

    fn get_state(&self) -> Self::State {
        (**self).get_state()
    }

    fn set_state(&self, state: Self::State) {
        (**self).set_state(state)
    }

    fn subscribe(&self, listener: Listener<Self::State>) -> Subscription {
        (**self).subscribe(listener)
    }

    fn flush(&self) {
        (**self).flush()
    }

    fn destroy(&self) {
        (**self).destroy()
    }
}

/// Handle to a registered listener.
///
/// The unsubscribe callback runs at most once: either through
/// [`unsubscribe`](Subscription::unsubscribe) or when the handle is dropped.
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Wrap the producer's unsubscribe callback.
    pub fn new<F>(unsubscribe: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            unsubscribe: Some(Box::new(unsubscribe)),
        }
    }

    /// A subscription with nothing to release.
    pub fn noop() -> Self {
        Self { unsubscribe: None }
    }

    /// Check if the unsubscribe callback is still pending.
    pub fn is_active(&self) -> bool {
        self.unsubscribe.is_some()
    }

    /// Release the listener.
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

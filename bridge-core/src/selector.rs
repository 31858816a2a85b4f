//! Selectors
//!
//! A selector projects a slice of producer state into a [`Value`] owned by
//! a scope, and keeps it current for as long as the scope lives.
//!
//! # How Selectors Work
//!
//! 1. The producer's current state is read and projected once to seed the
//!    value.
//!
//! 2. A listener is subscribed to the producer. Each transition re-runs
//!    the projection and compares the result against the last value
//!    written. Only a result that differs is written, so observers of the
//!    value see at most one write per transition and none for a no-op.
//!
//! 3. Releasing the subscription is registered as a scope cleanup. Once
//!    the scope is destroyed the projection never runs again.
//!
//! # Equality
//!
//! [`create_selector`] compares projections with `PartialEq`. For results
//! that are expensive to compare, or where a fresh allocation should count
//! as a change, pass a custom check to [`create_selector_with`]; [`ptr_eq`]
//! compares `Arc` results by identity.
//!
//! # Concurrency
//!
//! Notifications may be delivered from any thread. Comparing against the
//! baseline, advancing it and writing the value happen under one lock, so
//! concurrent deliveries are applied one at a time and the value always
//! ends up holding the baseline. Observers of the value run under that lock
//! too: an observer must not synchronously commit to the same producer, or
//! the nested delivery blocks on the selector it came from.
//!
//! Panics raised by the projection or the equality check are not caught.
//! They unwind into whoever delivered the notification, typically the
//! caller of [`Producer::set_state`]. A panic leaves the value and its
//! baseline as they were, and the selector keeps tracking later
//! transitions.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::error::{BridgeError, Result};
use crate::producer::Producer;
use crate::scope::{Scope, Value};

/// Project producer state into a scope-owned value, comparing with `PartialEq`.
///
/// # Example
///
/// ```rust,ignore
/// let scope = Scope::new();
/// let count = create_selector(&scope, &producer, |state: &AppState| state.count)?;
///
/// producer.set_state(AppState { count: 1 });
/// assert_eq!(count.get(), 1);
///
/// scope.destroy(); // count stops tracking the producer
/// ```
pub fn create_selector<P, F, R>(scope: &Scope, producer: &P, selector: F) -> Result<Value<R>>
where
    P: Producer + ?Sized,
    F: Fn(&P::State) -> R + Send + Sync + 'static,
    R: Clone + PartialEq + Send + Sync + 'static,
{
    attach(scope, producer, selector, |next: &R, prev: &R| next == prev)
}

/// Project producer state into a scope-owned value with a custom equality.
///
/// `equality(next, prev)` returns `true` when the two results should be
/// treated as the same, in which case the value is left untouched and
/// `prev` stays the comparison baseline.
pub fn create_selector_with<P, F, E, R>(
    scope: &Scope,
    producer: &P,
    selector: F,
    equality: E,
) -> Result<Value<R>>
where
    P: Producer + ?Sized,
    F: Fn(&P::State) -> R + Send + Sync + 'static,
    E: Fn(&R, &R) -> bool + Send + Sync + 'static,
    R: Clone + Send + Sync + 'static,
{
    attach(scope, producer, selector, equality)
}

/// Identity equality for `Arc` projections.
pub fn ptr_eq<T: ?Sized>(next: &Arc<T>, prev: &Arc<T>) -> bool {
    Arc::ptr_eq(next, prev)
}

fn attach<P, F, E, R>(scope: &Scope, producer: &P, selector: F, equality: E) -> Result<Value<R>>
where
    P: Producer + ?Sized,
    F: Fn(&P::State) -> R + Send + Sync + 'static,
    E: Fn(&R, &R) -> bool + Send + Sync + 'static,
    R: Clone + Send + Sync + 'static,
{
    if scope.is_destroyed() {
        return Err(BridgeError::ScopeDestroyed(scope.id()));
    }

    let initial = selector(&producer.get_state());
    let value = scope.value(initial.clone());
    let value_id = value.id();

    // Last result written to `value`.
    let prev = Mutex::new(initial);
    let active = Arc::new(AtomicBool::new(true));

    let listener = {
        let value = value.clone();
        let active = Arc::clone(&active);
        move |next_state: &P::State, _prev_state: &P::State| {
            if !active.load(Ordering::SeqCst) {
                return;
            }

            let next = selector(next_state);

            // Held through the write so the baseline and the cell advance
            // together when notifications arrive from several threads.
            let mut prev = prev.lock();
            if equality(&next, &*prev) {
                trace!(value = value_id, "selection unchanged");
                return;
            }
            *prev = next.clone();

            trace!(value = value_id, "selection changed");
            value.set(next);
        }
    };

    let subscription = producer.subscribe(Box::new(listener));
    debug!(scope = %scope.id(), value = value_id, "selector attached");

    scope.on_cleanup(move || {
        active.store(false, Ordering::SeqCst);
        subscription.unsubscribe();
        debug!(value = value_id, "selector released");
    });

    Ok(value)
}

/// A scope paired with the producer its selectors read from.
///
/// # Example
///
/// ```rust,ignore
/// let ui = ProducerScope::new(Scope::new(), Arc::new(producer));
/// let name = ui.selector(|state: &AppState| state.user.name.clone())?;
/// let items = ui.selector_with(|state: &AppState| state.items.clone(), ptr_eq)?;
/// ```
pub struct ProducerScope<P>
where
    P: Producer + ?Sized,
{
    scope: Scope,
    producer: Arc<P>,
}

impl<P> ProducerScope<P>
where
    P: Producer + ?Sized,
{
    pub fn new(scope: Scope, producer: Arc<P>) -> Self {
        Self { scope, producer }
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn producer(&self) -> &Arc<P> {
        &self.producer
    }

    /// See [`create_selector`].
    pub fn selector<F, R>(&self, selector: F) -> Result<Value<R>>
    where
        F: Fn(&P::State) -> R + Send + Sync + 'static,
        R: Clone + PartialEq + Send + Sync + 'static,
    {
        create_selector(&self.scope, &*self.producer, selector)
    }

    /// See [`create_selector_with`].
    pub fn selector_with<F, E, R>(&self, selector: F, equality: E) -> Result<Value<R>>
    where
        F: Fn(&P::State) -> R + Send + Sync + 'static,
        E: Fn(&R, &R) -> bool + Send + Sync + 'static,
        R: Clone + Send + Sync + 'static,
    {
        create_selector_with(&self.scope, &*self.producer, selector, equality)
    }

    /// A child scope over the same producer.
    pub fn inner(&self) -> Self {
        Self {
            scope: self.scope.inner(),
            producer: Arc::clone(&self.producer),
        }
    }
}

impl<P> Clone for ProducerScope<P>
where
    P: Producer + ?Sized,
{
    fn clone(&self) -> Self {
        Self {
            scope: self.scope.clone(),
            producer: Arc::clone(&self.producer),
        }
    }
}

impl<P> fmt::Debug for ProducerScope<P>
where
    P: Producer + ?Sized,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProducerScope")
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

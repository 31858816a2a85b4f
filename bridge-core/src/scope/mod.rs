//! Scopes
//!
//! A Scope is an ownership context. Everything created for a piece of UI
//! (reactive values, subscriptions, child scopes) is tied to one, and all
//! of it is released together when the scope is destroyed.
//!
//! # Lifecycle
//!
//! 1. Resources register a cleanup callback with `on_cleanup`.
//!
//! 2. `destroy` runs every registered cleanup exactly once, newest first,
//!    so resources acquired later are released before the ones they were
//!    built on.
//!
//! 3. Dropping the last handle to a scope destroys it.
//!
//! A cleanup registered after destruction runs immediately instead of
//! being queued, so nothing registered late is leaked.
//!
//! # Child Scopes
//!
//! A parent only keeps a weak link to each child. Dropping every handle to
//! a child destroys it, and a destroyed child removes its entry from the
//! parent, so a long-lived parent does not accumulate dead children.

mod value;

pub use value::{ObserverId, Value};

use std::fmt;
use std::mem;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::{debug, warn};

/// Unique identifier for a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(u64);

impl ScopeId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

type Cleanup = Box<dyn FnOnce() + Send>;

struct ScopeInner {
    id: ScopeId,

    /// Pending cleanups keyed by registration, in registration order.
    cleanups: Mutex<IndexMap<u64, Cleanup>>,

    next_key: AtomicU64,

    /// The parent and the key of our entry in its cleanup table.
    parent: Mutex<Option<(Weak<ScopeInner>, u64)>>,

    destroyed: AtomicBool,
}

impl ScopeInner {
    fn new() -> Self {
        Self {
            id: ScopeId::new(),
            cleanups: Mutex::new(IndexMap::new()),
            next_key: AtomicU64::new(0),
            parent: Mutex::new(None),
            destroyed: AtomicBool::new(false),
        }
    }

    /// Queue a cleanup. Hands it back if the scope is already destroyed.
    fn register(&self, cleanup: Cleanup) -> Result<u64, Cleanup> {
        let mut pending = self.cleanups.lock();
        if self.destroyed.load(Ordering::SeqCst) {
            return Err(cleanup);
        }
        let key = self.next_key.fetch_add(1, Ordering::Relaxed);
        pending.insert(key, cleanup);
        Ok(key)
    }

    fn destroy(&self) {
        let cleanups = {
            let mut pending = self.cleanups.lock();
            if self.destroyed.swap(true, Ordering::SeqCst) {
                return;
            }
            mem::take(&mut *pending)
        };

        let parent = self.parent.lock().take();
        if let Some((parent, key)) = parent {
            if let Some(parent) = parent.upgrade() {
                parent.cleanups.lock().shift_remove(&key);
            }
        }

        debug!(scope = %self.id, cleanups = cleanups.len(), "destroying scope");

        for cleanup in cleanups.into_values().rev() {
            cleanup();
        }
    }
}

impl Drop for ScopeInner {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// A handle to an ownership context.
///
/// Clones share the same context. The context is destroyed by an explicit
/// [`destroy`](Scope::destroy) or when the last handle is dropped.
///
/// # Example
///
/// ```rust
/// use bridge_core::scope::Scope;
///
/// let scope = Scope::new();
/// scope.on_cleanup(|| println!("released"));
///
/// scope.destroy(); // prints "released"
/// scope.destroy(); // no-op
/// ```
#[derive(Clone)]
pub struct Scope {
    inner: Arc<ScopeInner>,
}

impl Scope {
    /// Create a new, live scope.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ScopeInner::new()),
        }
    }

    /// Get the scope's unique ID.
    pub fn id(&self) -> ScopeId {
        self.inner.id
    }

    /// Create a reactive cell owned by this scope.
    pub fn value<T>(&self, initial: T) -> Value<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        Value::new(initial)
    }

    /// Register a callback to run when the scope is destroyed.
    ///
    /// If the scope is already destroyed the callback runs right away.
    pub fn on_cleanup<F>(&self, cleanup: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if let Err(cleanup) = self.inner.register(Box::new(cleanup)) {
            warn!(scope = %self.inner.id, "cleanup registered on a destroyed scope, running it now");
            cleanup();
        }
    }

    /// Create a child scope that is destroyed together with this one.
    ///
    /// The child is also destroyed on its own when it is destroyed
    /// explicitly or its last handle is dropped. Either way it leaves no
    /// entry behind in this scope.
    pub fn inner(&self) -> Scope {
        let child = Scope::new();
        let weak_child = Arc::downgrade(&child.inner);

        let release: Cleanup = Box::new(move || {
            if let Some(child) = weak_child.upgrade() {
                child.destroy();
            }
        });

        match self.inner.register(release) {
            Ok(key) => {
                *child.inner.parent.lock() = Some((Arc::downgrade(&self.inner), key));
            }
            Err(release) => {
                warn!(scope = %self.inner.id, "child scope created on a destroyed scope");
                release();
            }
        }

        child
    }

    /// Run all pending cleanups, newest first.
    ///
    /// Only the first call does anything.
    pub fn destroy(&self) {
        self.inner.destroy();
    }

    /// Check if the scope has been destroyed.
    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::SeqCst)
    }

    /// Get the number of cleanups waiting for destruction.
    pub fn cleanup_count(&self) -> usize {
        self.inner.cleanups.lock().len()
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("id", &self.id())
            .field("cleanup_count", &self.cleanup_count())
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicI32;

    fn recorder() -> (Arc<Mutex<Vec<&'static str>>>, impl Fn(&'static str) -> Cleanup) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let log_clone = log.clone();
        let make = move |name: &'static str| -> Cleanup {
            let log = log_clone.clone();
            Box::new(move || log.lock().push(name))
        };
        (log, make)
    }

    #[test]
    fn cleanups_run_newest_first() {
        let (log, make) = recorder();
        let scope = Scope::new();

        scope.on_cleanup(make("first"));
        scope.on_cleanup(make("second"));
        scope.on_cleanup(make("third"));
        assert_eq!(scope.cleanup_count(), 3);

        scope.destroy();
        assert_eq!(*log.lock(), vec!["third", "second", "first"]);
        assert_eq!(scope.cleanup_count(), 0);
    }

    #[test]
    fn destroy_runs_cleanups_once() {
        let runs = Arc::new(AtomicI32::new(0));
        let runs_clone = runs.clone();
        let scope = Scope::new();

        scope.on_cleanup(move || {
            runs_clone.fetch_add(1, Ordering::SeqCst);
        });

        scope.destroy();
        scope.destroy();
        assert!(scope.is_destroyed());
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropping_last_handle_destroys() {
        let runs = Arc::new(AtomicI32::new(0));
        let runs_clone = runs.clone();

        let scope = Scope::new();
        let other = scope.clone();
        scope.on_cleanup(move || {
            runs_clone.fetch_add(1, Ordering::SeqCst);
        });

        drop(scope);
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        drop(other);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cleanup_after_destroy_runs_immediately() {
        let runs = Arc::new(AtomicI32::new(0));
        let runs_clone = runs.clone();
        let scope = Scope::new();
        scope.destroy();

        scope.on_cleanup(move || {
            runs_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(scope.cleanup_count(), 0);
    }

    #[test]
    fn inner_scope_is_destroyed_with_parent() {
        let (log, make) = recorder();
        let parent = Scope::new();
        let child = parent.inner();

        child.on_cleanup(make("child"));
        parent.on_cleanup(make("parent"));

        parent.destroy();
        assert!(child.is_destroyed());
        assert_eq!(*log.lock(), vec!["parent", "child"]);
    }

    #[test]
    fn inner_scope_can_be_destroyed_first() {
        let (log, make) = recorder();
        let parent = Scope::new();
        let child = parent.inner();
        child.on_cleanup(make("child"));

        child.destroy();
        assert!(!parent.is_destroyed());

        parent.destroy();
        assert_eq!(*log.lock(), vec!["child"]);
    }

    #[test]
    fn destroyed_children_leave_no_entry_in_parent() {
        let parent = Scope::new();

        for _ in 0..1000 {
            let child = parent.inner();
            assert_eq!(parent.cleanup_count(), 1);
            child.destroy();
        }

        assert_eq!(parent.cleanup_count(), 0);
    }

    #[test]
    fn dropping_last_child_handle_destroys_child() {
        let (log, make) = recorder();
        let parent = Scope::new();

        let child = parent.inner();
        child.on_cleanup(make("child"));
        drop(child);

        assert_eq!(*log.lock(), vec!["child"]);
        assert_eq!(parent.cleanup_count(), 0);

        parent.destroy();
        assert_eq!(*log.lock(), vec!["child"]);
    }

    #[test]
    fn inner_of_destroyed_scope_is_destroyed() {
        let parent = Scope::new();
        parent.destroy();

        let child = parent.inner();
        assert!(child.is_destroyed());
        assert_eq!(parent.cleanup_count(), 0);
    }

    #[test]
    fn scope_ids_are_unique() {
        let a = Scope::new();
        let b = Scope::new();
        assert_ne!(a.id(), b.id());
        assert_eq!(a.id(), a.clone().id());
    }
}

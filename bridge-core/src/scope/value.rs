//! Value Implementation
//!
//! A Value is the reactive cell a scope hands out. It holds the current
//! content and a table of observers that are told about every write.
//!
//! # How Values Work
//!
//! 1. `get` returns a clone of the current content.
//!
//! 2. `set` replaces the content, bumps the write version, and calls every
//!    observer in the order it was registered.
//!
//! 3. Observers are plain callbacks. Any downstream reactive runtime can
//!    hang its own invalidation off `observe`.
//!
//! # Thread Safety
//!
//! The content sits behind an `RwLock` and the observer table behind a
//! second one. Neither lock is held while observers run, so an observer may
//! read the value it is observing.

use std::fmt::{self, Debug};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

/// Counter for generating unique value IDs.
static VALUE_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_value_id() -> u64 {
    VALUE_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Unique identifier for an observer registered on a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

impl ObserverId {
    /// Generate a new unique observer ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ObserverId {
    fn default() -> Self {
        Self::new()
    }
}

type Observer<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// A reactive cell holding a value of type `T`.
///
/// Cloning a `Value` yields another handle to the same cell.
///
/// # Example
///
/// ```rust
/// use bridge_core::scope::Scope;
///
/// let scope = Scope::new();
/// let count = scope.value(0);
///
/// count.set(5);
/// assert_eq!(count.get(), 5);
/// assert_eq!(count.version(), 1);
/// ```
pub struct Value<T>
where
    T: Clone + Send + Sync + 'static,
{
    id: u64,

    content: Arc<RwLock<T>>,

    /// Number of writes since creation.
    version: Arc<AtomicU64>,

    /// Observers keyed by ID, kept in registration order.
    observers: Arc<RwLock<IndexMap<ObserverId, Observer<T>>>>,
}

impl<T> Value<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a free-standing cell.
    ///
    /// Cells are normally obtained from [`Scope::value`](super::Scope::value).
    pub(crate) fn new(initial: T) -> Self {
        Self {
            id: next_value_id(),
            content: Arc::new(RwLock::new(initial)),
            version: Arc::new(AtomicU64::new(0)),
            observers: Arc::new(RwLock::new(IndexMap::new())),
        }
    }

    /// Get the cell's unique ID.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Get a clone of the current content.
    pub fn get(&self) -> T {
        self.content.read().clone()
    }

    /// Replace the content and notify observers.
    pub fn set(&self, value: T) {
        *self.content.write() = value.clone();
        self.version.fetch_add(1, Ordering::SeqCst);
        self.notify(&value);
    }

    /// Replace the content with a function of the current content.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        let next = {
            let guard = self.content.read();
            f(&*guard)
        };
        self.set(next);
    }

    /// Number of times `set` has been called on this cell.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    /// Register a callback invoked with the new content after every write.
    pub fn observe<F>(&self, on_change: F) -> ObserverId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = ObserverId::new();
        self.observers.write().insert(id, Arc::new(on_change));
        id
    }

    /// Remove an observer. Returns `false` if it was not registered.
    pub fn unobserve(&self, id: ObserverId) -> bool {
        self.observers.write().shift_remove(&id).is_some()
    }

    /// Get the number of observers.
    pub fn observer_count(&self) -> usize {
        self.observers.read().len()
    }

    fn notify(&self, value: &T) {
        // Snapshot so observers can (un)observe without deadlocking.
        let observers: Vec<Observer<T>> = self.observers.read().values().cloned().collect();
        for observer in observers {
            observer(value);
        }
    }
}

impl<T> Clone for Value<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            content: Arc::clone(&self.content),
            version: Arc::clone(&self.version),
            observers: Arc::clone(&self.observers),
        }
    }
}

impl<T> Debug for Value<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Value")
            .field("id", &self.id)
            .field("content", &*self.content.read())
            .field("version", &self.version())
            .field("observer_count", &self.observer_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

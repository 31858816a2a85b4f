//! Bridge Core
//!
//! This crate binds a reactive state container (a *producer*) to scoped
//! reactive values. It provides:
//!
//! - The producer contract: current state, change subscription, and the
//!   broadcaster/receiver shapes used to replicate state
//! - Scopes that own reactive values and release resources on teardown
//! - Selectors that project producer state into a scope-owned value and
//!   keep it current
//!
//! # Architecture
//!
//! - `producer`: traits the state container implements
//! - `scope`: ownership contexts and reactive `Value` cells
//! - `selector`: the adapter between the two
//!
//! # Example
//!
//! ```rust,ignore
//! use bridge_core::{create_selector, Scope};
//!
//! let scope = Scope::new();
//! let count = create_selector(&scope, &producer, |state: &AppState| state.count)?;
//!
//! count.observe(|count| println!("count is now {count}"));
//!
//! // Releases the producer subscription.
//! scope.destroy();
//! ```

pub mod error;
pub mod producer;
pub mod scope;
pub mod selector;

pub use error::{BridgeError, Result};
pub use producer::{Listener, Producer, Subscription, Wait};
pub use scope::{Scope, ScopeId, Value};
pub use selector::{create_selector, create_selector_with, ptr_eq, ProducerScope};

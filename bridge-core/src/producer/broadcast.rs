//! Broadcast Contract
//!
//! Shapes shared by a producer that replicates its state to remote players
//! (the broadcaster) and the producer on the other end that applies it
//! (the receiver). Transport and batching belong to the implementor.
//!
//! # Middleware
//!
//! Both halves hook into their producer's dispatch path through a
//! [`Middleware`]. The broadcaster's middleware captures shared actions for
//! the next batch; the receiver's middleware typically holds local
//! dispatches until the first hydration arrives. [`run_middleware`] threads
//! an action through a chain and into the producer's own dispatch.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Identifies a remote player a broadcaster streams to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

/// A dispatched action, captured for replay on a receiver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastAction {
    /// Name of the action on the producer.
    pub name: String,

    /// Arguments the action was dispatched with.
    pub arguments: Vec<serde_json::Value>,
}

impl BroadcastAction {
    pub fn new(name: impl Into<String>, arguments: Vec<serde_json::Value>) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }

    /// Decode the argument list as a tuple (or any sequence type).
    ///
    /// ```rust
    /// use bridge_core::producer::broadcast::BroadcastAction;
    /// use serde_json::json;
    ///
    /// let action = BroadcastAction::new("move", vec![json!(3), json!("north")]);
    /// let (steps, heading): (u32, String) = action.arguments_as().unwrap();
    /// assert_eq!(steps, 3);
    /// assert_eq!(heading, "north");
    /// ```
    pub fn arguments_as<T>(&self) -> serde_json::Result<T>
    where
        T: DeserializeOwned,
    {
        serde_json::from_value(serde_json::Value::Array(self.arguments.clone()))
    }
}

/// Forwards an action to the rest of the dispatch chain.
pub type Next<'a> = &'a dyn Fn(&BroadcastAction);

/// A step in a producer's dispatch chain.
///
/// Call `next` to pass the action on, possibly rewritten. Not calling it
/// swallows the action.
pub trait Middleware: Send + Sync {
    fn dispatch(&self, action: &BroadcastAction, next: Next<'_>);
}

impl<F> Middleware for F
where
    F: Fn(&BroadcastAction, Next<'_>) + Send + Sync,
{
    fn dispatch(&self, action: &BroadcastAction, next: Next<'_>) {
        self(action, next)
    }
}

/// Run `action` through `chain` in order, ending at `dispatch`.
pub fn run_middleware(
    chain: &[Arc<dyn Middleware>],
    action: &BroadcastAction,
    dispatch: Next<'_>,
) {
    match chain.split_first() {
        None => dispatch(action),
        Some((first, rest)) => {
            first.dispatch(action, &|action| run_middleware(rest, action, dispatch));
        }
    }
}

/// Server-side half: streams actions and state to players.
pub trait Broadcaster: Send + Sync {
    /// Middleware to install on the broadcasting producer.
    fn middleware(&self) -> Arc<dyn Middleware>;

    /// Begin streaming to a player, sending it the current state first.
    fn start(&self, player: PlayerId);

    /// Send any queued actions now instead of waiting for the next batch.
    fn flush(&self);

    /// Stop streaming to everyone and release the broadcaster.
    fn destroy(&self);
}

/// Client-side half: applies what a broadcaster sends.
pub trait Receiver: Send + Sync {
    /// The state type the receiving producer holds.
    type State;

    /// Middleware to install on the receiving producer.
    fn middleware(&self) -> Arc<dyn Middleware>;

    /// Replay actions dispatched on the broadcasting producer.
    fn dispatch(&self, actions: &[BroadcastAction]);

    /// Replace the receiving producer's state wholesale.
    fn hydrate(&self, state: Self::State);
}

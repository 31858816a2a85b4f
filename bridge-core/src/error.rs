//! Error types for the bridge.

use thiserror::Error;

use crate::scope::ScopeId;

/// Errors returned when wiring a producer into a scope.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    /// The scope was torn down before the selector could attach to it.
    #[error("scope {0} has already been destroyed")]
    ScopeDestroyed(ScopeId),
}

/// Convenience alias for results carrying a [`BridgeError`].
pub type Result<T> = std::result::Result<T, BridgeError>;

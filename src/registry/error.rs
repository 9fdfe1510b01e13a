//! Registry error types
//!
//! Delivery errors are produced by listeners and swallowed by the registry
//! at per-listener granularity; they never reach the publisher.

use crate::event::EncodeError;

/// Failure of a single listener invocation
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// The listener's connection is gone
    #[error("connection closed")]
    Closed,

    /// The listener's outbound queue is full
    #[error("listener lagged: outbound queue full")]
    Lagged,

    /// The event could not be serialized
    #[error(transparent)]
    Encoding(#[from] EncodeError),

    /// Listener-specific failure
    #[error("listener rejected event: {0}")]
    Rejected(String),
}

/// Error type for registry operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// A different registry is already installed as the process-wide instance
    #[error("a different registry is already installed globally")]
    GlobalAlreadyInstalled,
}

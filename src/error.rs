//! Error types
//!
//! Crate-level errors returned by the server entry points, and the
//! configuration errors raised before a stream is established.

use crate::registry::RegistryError;

/// Result type for livesync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O failure (bind, accept, serve)
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration problem detected at startup or before a stream opens
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Registry misuse
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Configuration errors
///
/// These are raised before any event is streamed: either at startup, when a
/// component is built, or while a connection is being prepared and before the
/// response is sent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A stream handler was built without an identity resolver
    #[error("stream handler requires an identity resolver")]
    MissingIdentityResolver,

    /// The identity resolver produced nothing for an incoming connection
    #[error("no subscriber identity could be resolved for channel '{channel}'")]
    IdentityUnresolved { channel: String },

    /// The base path is not of the form `/segment[/segment...]`
    #[error("invalid base path '{0}': must start with '/' and not end with '/'")]
    InvalidBasePath(String),

    /// An environment override could not be parsed
    #[error("invalid value '{value}' for {var}")]
    InvalidEnv { var: &'static str, value: String },
}

//! Streaming connection lifecycle
//!
//! A [`StreamHandler`] turns an incoming request into a [`StreamSession`]:
//! it resolves who is connecting, then the session registers a listener with
//! the registry and writes every delivered event onto the connection until
//! the connection goes away.

pub mod config;
pub mod context;
pub mod handler;
pub mod identity;
pub mod state;
pub mod stream;

pub use config::StreamConfig;
pub use context::{SessionStats, StreamContext};
pub use handler::{StreamHandler, StreamHandlerBuilder};
pub use identity::{CurrentSubscriber, FromExtension, IdentityResolver};
pub use state::{CloseReason, StreamPhase, StreamState};
pub use stream::StreamSession;

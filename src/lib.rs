//! livesync: live event delivery over Server-Sent Events
//!
//! Application code publishes [`Event`]s to a [`Registry`] keyed by channel
//! and subscriber. Every open stream registered under a matching key receives
//! the event as a `data:` frame on its HTTP connection.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use livesync::session::FromExtension;
//! use livesync::{LiveServer, Registry, ServerConfig, StreamHandler};
//!
//! # async fn run() -> livesync::Result<()> {
//! let registry = Arc::new(Registry::new());
//! let handler = StreamHandler::builder(Arc::clone(&registry))
//!     .identity(FromExtension)
//!     .build()?;
//!
//! let server = LiveServer::new(ServerConfig::default(), handler)?;
//! server.run().await
//! # }
//! ```

pub mod error;
pub mod event;
pub mod registry;
pub mod server;
pub mod session;

mod env;

pub use error::{ConfigError, Error, Result};
pub use event::Event;
pub use registry::{Listener, Registry, SubscriberId};
pub use server::{LiveServer, ServerConfig};
pub use session::{StreamConfig, StreamHandler};

//! HTTP server for live update streams
//!
//! Serves `GET <base_path>/<channel>` as a Server-Sent Events response. Each
//! connection is authenticated, its subscriber resolved, and then handed to a
//! [`StreamSession`](crate::session::StreamSession) that relays registry
//! events until the client leaves or the server shuts down.

mod auth;
mod config;
mod listener;
mod router;

pub use auth::{AllowAll, AuthResult, Authenticator};
pub use config::{ServerConfig, DEFAULT_BASE_PATH};
pub use listener::LiveServer;

//! Stream handler
//!
//! Builds [`StreamSession`]s for incoming connections. Holds the shared
//! registry, the identity strategy and the stream options.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::request::Parts;
use tokio::io::AsyncWrite;

use crate::error::ConfigError;
use crate::registry::Registry;

use super::config::StreamConfig;
use super::context::StreamContext;
use super::identity::IdentityResolver;
use super::stream::StreamSession;

/// Factory for streaming sessions
#[derive(Clone)]
pub struct StreamHandler {
    registry: Arc<Registry>,
    resolver: Arc<dyn IdentityResolver>,
    config: StreamConfig,
}

impl StreamHandler {
    /// Start building a handler around a shared registry
    pub fn builder(registry: Arc<Registry>) -> StreamHandlerBuilder {
        StreamHandlerBuilder {
            registry,
            resolver: None,
            config: StreamConfig::default(),
        }
    }

    /// Get the shared registry
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Get the stream configuration
    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Resolve the subscriber for an incoming request
    ///
    /// Fails before anything is written to the connection when no identity
    /// can be resolved.
    pub fn prepare(
        &self,
        channel: &str,
        request: &Parts,
        session_id: u64,
        peer_addr: Option<SocketAddr>,
    ) -> Result<StreamContext, ConfigError> {
        let subscriber =
            self.resolver
                .resolve(request)
                .ok_or_else(|| ConfigError::IdentityUnresolved {
                    channel: channel.to_owned(),
                })?;

        Ok(StreamContext::new(session_id, channel, subscriber).with_peer(peer_addr))
    }

    /// Create a session that streams onto `writer`
    pub fn session<W>(&self, ctx: StreamContext, writer: W) -> StreamSession<W>
    where
        W: AsyncWrite + Unpin,
    {
        StreamSession::new(ctx, writer, Arc::clone(&self.registry), self.config.clone())
    }
}

impl std::fmt::Debug for StreamHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamHandler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Builder for [`StreamHandler`]
pub struct StreamHandlerBuilder {
    registry: Arc<Registry>,
    resolver: Option<Arc<dyn IdentityResolver>>,
    config: StreamConfig,
}

impl StreamHandlerBuilder {
    /// Set the identity strategy (required)
    pub fn identity<R: IdentityResolver>(mut self, resolver: R) -> Self {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    /// Set stream options
    pub fn config(mut self, config: StreamConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the handler
    pub fn build(self) -> Result<StreamHandler, ConfigError> {
        let resolver = self.resolver.ok_or(ConfigError::MissingIdentityResolver)?;

        Ok(StreamHandler {
            registry: self.registry,
            resolver,
            config: self.config,
        })
    }
}

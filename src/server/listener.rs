//! Live update server
//!
//! Binds the configured address and serves the stream route until shut down.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::error::{ConfigError, Result};
use crate::registry::Registry;
use crate::server::auth::{AllowAll, Authenticator};
use crate::server::config::ServerConfig;
use crate::server::router::{router, ServerState};
use crate::session::StreamHandler;

/// Live update server
pub struct LiveServer<A: Authenticator = AllowAll> {
    config: ServerConfig,
    state: Arc<ServerState<A>>,
}

impl LiveServer<AllowAll> {
    /// Create a server that accepts every connection
    pub fn new(config: ServerConfig, handler: StreamHandler) -> std::result::Result<Self, ConfigError> {
        Self::with_authenticator(config, handler, AllowAll)
    }
}

impl<A: Authenticator> LiveServer<A> {
    /// Create a server that authenticates connections with `auth`
    pub fn with_authenticator(
        config: ServerConfig,
        handler: StreamHandler,
        auth: A,
    ) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        let state = Arc::new(ServerState::new(handler, auth, config.max_connections));
        Ok(Self { config, state })
    }

    /// Get a reference to the listener registry
    pub fn registry(&self) -> &Arc<Registry> {
        self.state.handler.registry()
    }

    /// Get the server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Token cancelled when the server shuts down; open streams close on it
    pub fn shutdown_token(&self) -> CancellationToken {
        self.state.shutdown.clone()
    }

    /// Router serving `<base_path>/:channel`, for mounting in a larger app
    ///
    /// Peer addresses are only logged when the router is served with
    /// `into_make_service_with_connect_info::<SocketAddr>()`.
    pub fn router(&self) -> Router {
        router(&self.config.route(), Arc::clone(&self.state))
    }

    /// Run the server
    ///
    /// This method blocks until the server fails.
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;

        let token = self.shutdown_token();
        tokio::spawn(async move {
            shutdown.await;
            tracing::info!("Shutdown signal received");
            token.cancel();
        });

        self.serve(listener).await
    }

    /// Serve on an already bound listener until the shutdown token is cancelled
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let addr = listener.local_addr()?;
        tracing::info!(
            addr = %addr,
            route = %self.config.route(),
            "Live server listening"
        );

        let token = self.shutdown_token();
        let app = self
            .router()
            .into_make_service_with_connect_info::<SocketAddr>();

        // Streams watch the same token, so in-flight bodies end and the
        // graceful drain can complete.
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { token.cancelled().await })
            .await?;

        tracing::info!(
            remaining = self.registry().count_total(),
            "Live server stopped"
        );
        Ok(())
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    use super::*;
    use crate::event::{wire, Event};
    use crate::registry::SubscriberId;

    fn handler(registry: &Arc<Registry>) -> StreamHandler {
        StreamHandler::builder(Arc::clone(registry))
            .identity(|_: &axum::http::request::Parts| Some(SubscriberId::from(7)))
            .build()
            .unwrap()
    }

    #[test]
    fn test_new_rejects_invalid_base_path() {
        let registry = Arc::new(Registry::new());
        let config = ServerConfig::default().base_path("live/");

        let result = LiveServer::new(config, handler(&registry));
        assert!(matches!(result, Err(ConfigError::InvalidBasePath(_))));
    }

    #[test]
    fn test_registry_is_shared() {
        let registry = Arc::new(Registry::new());
        let server = LiveServer::new(ServerConfig::default(), handler(&registry)).unwrap();

        assert!(Arc::ptr_eq(server.registry(), &registry));
        assert_eq!(server.bind_addr().port(), 8080);
    }

    async fn read_until(stream: &mut TcpStream, needle: &str) -> String {
        let mut received = Vec::new();
        let mut buf = [0u8; 1024];
        tokio::time::timeout(Duration::from_secs(2), async {
            while !String::from_utf8_lossy(&received).contains(needle) {
                let n = stream.read(&mut buf).await.unwrap();
                assert!(n > 0, "connection closed early");
                received.extend_from_slice(&buf[..n]);
            }
        })
        .await
        .expect("timed out reading response");
        String::from_utf8_lossy(&received).into_owned()
    }

    #[tokio::test]
    async fn test_serve_streams_and_shuts_down() {
        let registry = Arc::new(Registry::new());
        let server = Arc::new(LiveServer::new(ServerConfig::default(), handler(&registry)).unwrap());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let task = tokio::spawn({
            let server = Arc::clone(&server);
            async move { server.serve(listener).await }
        });

        let mut client = TcpStream::connect(addr).await.unwrap();
        client
            .write_all(b"GET /live/todos HTTP/1.1\r\nhost: localhost\r\n\r\n")
            .await
            .unwrap();

        let head = read_until(&mut client, ": connected to todos").await;
        assert!(head.starts_with("HTTP/1.1 200"));
        assert!(head.contains("content-type: text/event-stream"));

        while registry.count_for("todos", 7) == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let event = Event::new("todo.created", json!({"id": 1}));
        assert_eq!(registry.publish_to_subscriber("todos", 7, &event), 1);

        let frame = wire::encode_event(&event).unwrap();
        read_until(&mut client, std::str::from_utf8(&frame).unwrap()).await;

        server.shutdown_token().cancel();
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("server did not stop")
            .unwrap()
            .unwrap();

        assert_eq!(registry.count_total(), 0);
    }
}

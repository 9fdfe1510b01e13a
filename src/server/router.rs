//! HTTP route for opening streams
//!
//! `GET <base_path>/<channel>`: limit check, authentication, identity
//! resolution, then a `text/event-stream` response whose body is fed by a
//! spawned [`StreamSession`](crate::session::StreamSession).

use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::extract::{ConnectInfo, Path, Request, State};
use axum::http::{header, HeaderName, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tokio::io::{AsyncRead, ReadBuf};
use tokio::sync::Semaphore;
use tokio_util::io::ReaderStream;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::session::StreamHandler;

use super::auth::{AuthResult, Authenticator};

/// Shared state for the stream route
pub(crate) struct ServerState<A> {
    pub handler: StreamHandler,
    pub auth: A,
    pub shutdown: CancellationToken,
    pub connections: Option<Arc<Semaphore>>,
    pub next_session_id: AtomicU64,
}

impl<A> ServerState<A> {
    pub fn new(handler: StreamHandler, auth: A, max_connections: usize) -> Self {
        let connections = if max_connections > 0 {
            Some(Arc::new(Semaphore::new(max_connections)))
        } else {
            None
        };

        Self {
            handler,
            auth,
            shutdown: CancellationToken::new(),
            connections,
            next_session_id: AtomicU64::new(1),
        }
    }
}

/// Build the router with the single stream route
pub(crate) fn router<A: Authenticator>(route: &str, state: Arc<ServerState<A>>) -> Router {
    Router::new()
        .route(route, get(open_stream::<A>))
        .with_state(state)
}

async fn open_stream<A: Authenticator>(
    State(state): State<Arc<ServerState<A>>>,
    Path(channel): Path<String>,
    request: Request,
) -> Response {
    let (mut parts, _body) = request.into_parts();
    let peer_addr = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0);

    // Check connection limit
    let permit = match state.connections {
        Some(ref sem) => match Arc::clone(sem).try_acquire_owned() {
            Ok(permit) => Some(permit),
            Err(_) => {
                tracing::warn!(channel = %channel, peer = ?peer_addr, "Stream rejected: limit reached");
                return (StatusCode::SERVICE_UNAVAILABLE, "connection limit reached").into_response();
            }
        },
        None => None,
    };

    match state.auth.authenticate(&channel, &mut parts).await {
        AuthResult::Accept => {}
        AuthResult::Unauthorized(reason) => {
            tracing::debug!(channel = %channel, peer = ?peer_addr, reason = %reason, "Stream unauthorized");
            return (StatusCode::UNAUTHORIZED, reason).into_response();
        }
        AuthResult::Forbidden(reason) => {
            tracing::debug!(channel = %channel, peer = ?peer_addr, reason = %reason, "Stream forbidden");
            return (StatusCode::FORBIDDEN, reason).into_response();
        }
    }

    let session_id = state.next_session_id.fetch_add(1, Ordering::Relaxed);
    let ctx = match state.handler.prepare(&channel, &parts, session_id, peer_addr) {
        Ok(ctx) => ctx,
        Err(e) => {
            tracing::error!(
                session_id = session_id,
                channel = %channel,
                error = %e,
                "Cannot open stream"
            );
            return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
        }
    };

    let (writer, reader) = tokio::io::duplex(state.handler.config().pipe_capacity);
    let disconnected = CancellationToken::new();
    let session = state
        .handler
        .session(ctx, writer)
        .watch_disconnect(disconnected.clone());
    let reader = BodyReader {
        inner: reader,
        _disconnect: disconnected.drop_guard(),
    };
    let shutdown = state.shutdown.clone();

    tokio::spawn(async move {
        let _permit = permit;
        session.run(shutdown).await;
    });

    (
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
            (HeaderName::from_static("x-accel-buffering"), "no"),
        ],
        Body::from_stream(ReaderStream::new(reader)),
    )
        .into_response()
}

/// Response body source; dropping it tells the session the client left
struct BodyReader<R> {
    inner: R,
    _disconnect: DropGuard,
}

impl<R: AsyncRead + Unpin> AsyncRead for BodyReader<R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

//! Streaming session
//!
//! Drives one connection through its lifecycle:
//!
//! 1. write the `connected` comment
//! 2. register a listener that encodes events and queues the frames
//! 3. write queued frames (and keep-alives) as they arrive
//! 4. unregister on every exit route, including the future being dropped
//!
//! Publishers never wait on the connection. The listener only performs a
//! non-blocking `try_send` onto a bounded queue; the session task does the
//! actual write.

use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::event::wire;
use crate::registry::{DeliveryError, Listener, Registry, Unregister};

use super::config::StreamConfig;
use super::context::{SessionStats, StreamContext};
use super::state::{CloseReason, StreamPhase, StreamState};

/// One streaming connection
pub struct StreamSession<W> {
    ctx: StreamContext,
    writer: W,
    registry: Arc<Registry>,
    config: StreamConfig,
    state: StreamState,
    stats: SessionStats,
    disconnected: CancellationToken,
}

impl<W> StreamSession<W>
where
    W: AsyncWrite + Unpin,
{
    /// Create a session in the `Connecting` phase
    pub fn new(
        ctx: StreamContext,
        writer: W,
        registry: Arc<Registry>,
        config: StreamConfig,
    ) -> Self {
        Self {
            ctx,
            writer,
            registry,
            config,
            state: StreamState::new(),
            stats: SessionStats::default(),
            disconnected: CancellationToken::new(),
        }
    }

    /// Close with [`CloseReason::Disconnected`] once `token` is cancelled
    ///
    /// Lets the transport report a departed client without waiting for the
    /// next write to fail.
    pub fn watch_disconnect(mut self, token: CancellationToken) -> Self {
        self.disconnected = token;
        self
    }

    /// Get the session context
    pub fn context(&self) -> &StreamContext {
        &self.ctx
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> StreamPhase {
        self.state.phase()
    }

    /// Run until the connection closes
    ///
    /// Returns why it closed. The listener is unregistered before this
    /// returns; if the future is dropped instead, it is unregistered on drop.
    pub async fn run(mut self, shutdown: CancellationToken) -> CloseReason {
        let reason = self.stream(&shutdown).await;
        self.state.close(reason);

        tracing::info!(
            session_id = self.ctx.session_id,
            key = %self.ctx.key(),
            reason = %reason,
            frames = self.stats.frames_written,
            bytes = self.stats.bytes_written,
            dropped = self.stats.events_dropped,
            duration_ms = self.state.duration().as_millis() as u64,
            open_ms = ?self.state.open_duration().map(|d| d.as_millis() as u64),
            "Stream closed"
        );

        reason
    }

    async fn stream(&mut self, shutdown: &CancellationToken) -> CloseReason {
        // Overflow cancels `stop` only; shutdown cancels both
        let stop = shutdown.child_token();
        let disconnected = self.disconnected.clone();

        self.state.open();
        let hello = wire::connected_frame(&self.ctx.channel);
        if let Err(reason) = self.send(&hello, &stop, shutdown).await {
            return reason;
        }

        let (tx, mut rx) = mpsc::channel(self.config.queue_capacity);
        let dropped = Arc::new(AtomicU64::new(0));
        let listener = connection_listener(tx, stop.clone(), Arc::clone(&dropped));
        let subscription = Subscription(self.registry.register(
            self.ctx.channel.as_str(),
            &self.ctx.subscriber,
            listener,
        ));

        tracing::info!(
            session_id = self.ctx.session_id,
            channel = %self.ctx.channel,
            subscriber = %self.ctx.subscriber,
            peer = ?self.ctx.peer_addr,
            "Stream opened"
        );

        let mut heartbeat = self
            .config
            .heartbeat_interval
            .filter(|period| !period.is_zero())
            .map(|period| {
                let mut interval = tokio::time::interval_at(Instant::now() + period, period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                interval
            });

        let reason = loop {
            tokio::select! {
                biased;

                _ = stop.cancelled() => break stop_reason(shutdown),

                _ = disconnected.cancelled() => break CloseReason::Disconnected,

                frame = rx.recv() => match frame {
                    Some(frame) => {
                        if let Err(reason) = self.send(&frame, &stop, shutdown).await {
                            break reason;
                        }
                    }
                    // Registry dropped our listener
                    None => break CloseReason::Evicted,
                },

                _ = tick(&mut heartbeat) => {
                    if let Err(reason) = self.send(&wire::keepalive_frame(), &stop, shutdown).await {
                        break reason;
                    }
                }
            }
        };

        subscription.close();
        self.stats.events_dropped = dropped.load(Ordering::Relaxed);
        reason
    }

    /// Write one frame, giving up early on shutdown or overflow
    async fn send(
        &mut self,
        frame: &[u8],
        stop: &CancellationToken,
        shutdown: &CancellationToken,
    ) -> Result<(), CloseReason> {
        tokio::select! {
            biased;

            _ = stop.cancelled() => Err(stop_reason(shutdown)),

            result = self.write_frame(frame) => result.map_err(|e| {
                tracing::debug!(
                    session_id = self.ctx.session_id,
                    channel = %self.ctx.channel,
                    error = %e,
                    "Write failed"
                );
                CloseReason::WriteFailed
            }),
        }
    }

    async fn write_frame(&mut self, frame: &[u8]) -> io::Result<()> {
        self.writer.write_all(frame).await?;
        self.writer.flush().await?;

        self.stats.frames_written += 1;
        self.stats.bytes_written += frame.len() as u64;
        Ok(())
    }
}

/// Unregisters on drop, so a cancelled session still deregisters
struct Subscription(Unregister);

impl Subscription {
    fn close(&self) {
        if self.0.unregister() {
            tracing::debug!(
                key = %self.0.key(),
                listener = %self.0.listener_id(),
                "Listener unregistered"
            );
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        // Cancelled before the explicit close
        if !self.0.is_unregistered() {
            self.close();
        }
    }
}

fn connection_listener(
    tx: mpsc::Sender<Bytes>,
    stop: CancellationToken,
    dropped: Arc<AtomicU64>,
) -> Listener {
    Listener::new(move |event| {
        let frame = wire::encode_event(event).map_err(|e| {
            dropped.fetch_add(1, Ordering::Relaxed);
            DeliveryError::from(e)
        })?;

        tx.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => {
                dropped.fetch_add(1, Ordering::Relaxed);
                stop.cancel();
                DeliveryError::Lagged
            }
            TrySendError::Closed(_) => DeliveryError::Closed,
        })
    })
}

fn stop_reason(shutdown: &CancellationToken) -> CloseReason {
    if shutdown.is_cancelled() {
        CloseReason::Shutdown
    } else {
        CloseReason::Overflow
    }
}

async fn tick(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use tokio::io::{duplex, AsyncReadExt};
    use tokio_test::io::Builder;

    use super::*;
    use crate::event::Event;

    fn ctx() -> StreamContext {
        StreamContext::new(1, "todos", 1.into())
    }

    fn quiet() -> StreamConfig {
        StreamConfig::default().disable_heartbeat()
    }

    async fn wait_for_count(registry: &Registry, expected: usize) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while registry.count_for("todos", 1) != expected {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("timed out waiting for listener count");
    }

    #[tokio::test]
    async fn test_forwards_events_then_tears_down_on_write_failure() {
        let registry = Arc::new(Registry::new());
        let first = Event::new("todo.created", json!({"id": 1})).with_html("<li>\n1\n</li>");
        let second = Event::new("todo.created", json!({"id": 2}));

        let writer = Builder::new()
            .write(b": connected to todos\n\n")
            .write(&wire::encode_event(&first).unwrap())
            .write_error(io::Error::new(io::ErrorKind::BrokenPipe, "peer gone"))
            .build();

        let session = StreamSession::new(ctx(), writer, Arc::clone(&registry), quiet());
        let task = tokio::spawn(session.run(CancellationToken::new()));

        wait_for_count(&registry, 1).await;
        assert_eq!(registry.publish_to_subscriber("todos", 1, &first), 1);
        assert_eq!(registry.publish_to_subscriber("todos", 1, &second), 1);

        assert_eq!(task.await.unwrap(), CloseReason::WriteFailed);
        assert_eq!(registry.count_for("todos", 1), 0);
        assert!(registry.list_active_keys().is_empty());
    }

    #[tokio::test]
    async fn test_failed_connected_frame_never_registers() {
        let registry = Arc::new(Registry::new());
        let writer = Builder::new()
            .write_error(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
            .build();

        let session = StreamSession::new(ctx(), writer, Arc::clone(&registry), quiet());
        assert_eq!(session.phase(), StreamPhase::Connecting);

        let reason = session.run(CancellationToken::new()).await;

        assert_eq!(reason, CloseReason::WriteFailed);
        assert_eq!(registry.count_total(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_unregisters() {
        let registry = Arc::new(Registry::new());
        let writer = Builder::new().write(b": connected to todos\n\n").build();
        let shutdown = CancellationToken::new();

        let session = StreamSession::new(ctx(), writer, Arc::clone(&registry), quiet());
        let task = tokio::spawn(session.run(shutdown.clone()));

        wait_for_count(&registry, 1).await;
        shutdown.cancel();

        assert_eq!(task.await.unwrap(), CloseReason::Shutdown);
        assert_eq!(registry.count_for("todos", 1), 0);
    }

    #[tokio::test]
    async fn test_clear_evicts_session() {
        let registry = Arc::new(Registry::new());
        let writer = Builder::new().write(b": connected to todos\n\n").build();

        let session = StreamSession::new(ctx(), writer, Arc::clone(&registry), quiet());
        let task = tokio::spawn(session.run(CancellationToken::new()));

        wait_for_count(&registry, 1).await;
        assert_eq!(registry.clear_channel("todos", 1), 1);

        assert_eq!(task.await.unwrap(), CloseReason::Evicted);
        assert_eq!(registry.count_total(), 0);
    }

    #[tokio::test]
    async fn test_disconnect_closes_idle_session() {
        let registry = Arc::new(Registry::new());
        let writer = Builder::new().write(b": connected to todos\n\n").build();
        let disconnected = CancellationToken::new();

        let session = StreamSession::new(ctx(), writer, Arc::clone(&registry), quiet())
            .watch_disconnect(disconnected.clone());
        let task = tokio::spawn(session.run(CancellationToken::new()));

        wait_for_count(&registry, 1).await;
        disconnected.cancel();

        let reason = tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("session ignored the disconnect")
            .unwrap();
        assert_eq!(reason, CloseReason::Disconnected);
        assert_eq!(registry.count_for("todos", 1), 0);
    }

    #[tokio::test]
    async fn test_cancelled_session_unregisters() {
        let registry = Arc::new(Registry::new());
        let (mut client, server) = duplex(1024);

        let session = StreamSession::new(ctx(), server, Arc::clone(&registry), quiet());
        let task = tokio::spawn(session.run(CancellationToken::new()));

        let mut hello = vec![0u8; b": connected to todos\n\n".len()];
        client.read_exact(&mut hello).await.unwrap();
        assert_eq!(&hello[..], b": connected to todos\n\n");

        wait_for_count(&registry, 1).await;
        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());

        assert_eq!(registry.count_for("todos", 1), 0);
    }

    #[tokio::test]
    async fn test_events_arrive_in_publish_order() {
        let registry = Arc::new(Registry::new());
        let (mut client, server) = duplex(64 * 1024);

        let session = StreamSession::new(ctx(), server, Arc::clone(&registry), quiet());
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(session.run(shutdown.clone()));

        wait_for_count(&registry, 1).await;

        let mut expected = wire::connected_frame("todos").to_vec();
        for i in 0..10 {
            let event = Event::new("tick", json!(i));
            expected.extend_from_slice(&wire::encode_event(&event).unwrap());
            assert_eq!(registry.publish_to_channel("todos", &event), 1);
        }

        let mut received = vec![0u8; expected.len()];
        client.read_exact(&mut received).await.unwrap();
        assert_eq!(received, expected);

        shutdown.cancel();
        assert_eq!(task.await.unwrap(), CloseReason::Shutdown);
    }

    #[tokio::test]
    async fn test_heartbeat_written_while_idle() {
        let registry = Arc::new(Registry::new());
        let (mut client, server) = duplex(1024);
        let config = StreamConfig::default().heartbeat(Duration::from_millis(20));

        let session = StreamSession::new(ctx(), server, Arc::clone(&registry), config);
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(session.run(shutdown.clone()));

        let mut expected = wire::connected_frame("todos").to_vec();
        expected.extend_from_slice(&wire::keepalive_frame());
        expected.extend_from_slice(&wire::keepalive_frame());

        let mut received = vec![0u8; expected.len()];
        tokio::time::timeout(Duration::from_secs(2), client.read_exact(&mut received))
            .await
            .expect("no keep-alive")
            .unwrap();
        assert_eq!(received, expected);

        shutdown.cancel();
        assert_eq!(task.await.unwrap(), CloseReason::Shutdown);
    }

    #[tokio::test]
    async fn test_heartbeat_detects_dead_peer() {
        let registry = Arc::new(Registry::new());
        let (client, server) = duplex(1024);
        let config = StreamConfig::default().heartbeat(Duration::from_millis(10));

        let session = StreamSession::new(ctx(), server, Arc::clone(&registry), config);
        let task = tokio::spawn(session.run(CancellationToken::new()));

        wait_for_count(&registry, 1).await;
        drop(client);

        let reason = tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("session did not notice the closed peer")
            .unwrap();
        assert_eq!(reason, CloseReason::WriteFailed);
        assert_eq!(registry.count_total(), 0);
    }

    #[tokio::test]
    async fn test_overflow_closes_slow_consumer() {
        let registry = Arc::new(Registry::new());
        // Room for the connected frame only; the client stops reading after it
        let (mut client, server) = duplex(32);
        let config = quiet().queue_capacity(1);

        let session = StreamSession::new(ctx(), server, Arc::clone(&registry), config);
        let task = tokio::spawn(session.run(CancellationToken::new()));

        let mut hello = vec![0u8; b": connected to todos\n\n".len()];
        client.read_exact(&mut hello).await.unwrap();
        wait_for_count(&registry, 1).await;

        let big = Event::new("bulk", json!({"payload": "x".repeat(256)}));
        for _ in 0..8 {
            registry.publish_to_subscriber("todos", 1, &big);
        }

        let reason = tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("slow consumer was not closed")
            .unwrap();
        assert_eq!(reason, CloseReason::Overflow);
        assert_eq!(registry.count_total(), 0);
    }

    #[tokio::test]
    async fn test_publish_after_teardown_is_noop() {
        let registry = Arc::new(Registry::new());
        let writer = Builder::new().write(b": connected to todos\n\n").build();
        let shutdown = CancellationToken::new();

        let session = StreamSession::new(ctx(), writer, Arc::clone(&registry), quiet());
        let task = tokio::spawn(session.run(shutdown.clone()));
        wait_for_count(&registry, 1).await;
        shutdown.cancel();
        task.await.unwrap();

        let event = Event::new("late", json!(null));
        assert_eq!(registry.publish_to_subscriber("todos", 1, &event), 0);
    }
}

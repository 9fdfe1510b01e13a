//! Stream state machine
//!
//! Tracks a streaming connection from acceptance to teardown:
//! `Connecting → Open → Closed`. `Closed` is terminal and is entered once.

use std::time::{Duration, Instant};

/// Stream lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPhase {
    /// Connection accepted, connected frame not yet written
    Connecting,
    /// Listener registered, events flowing
    Open,
    /// Torn down
    Closed,
}

/// Why a stream closed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Writing to the connection failed (peer gone, broken pipe)
    WriteFailed,
    /// The client went away (response body dropped)
    Disconnected,
    /// Server shutdown
    Shutdown,
    /// The registry dropped this listener (clear operation)
    Evicted,
    /// The outbound queue overflowed and an event had to be dropped
    Overflow,
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CloseReason::WriteFailed => "write failed",
            CloseReason::Disconnected => "disconnected",
            CloseReason::Shutdown => "shutdown",
            CloseReason::Evicted => "evicted",
            CloseReason::Overflow => "overflow",
        };
        f.write_str(s)
    }
}

/// Lifecycle state of one stream
#[derive(Debug)]
pub struct StreamState {
    phase: StreamPhase,
    connected_at: Instant,
    opened_at: Option<Instant>,
}

impl StreamState {
    /// Create state for a freshly accepted connection
    pub fn new() -> Self {
        Self {
            phase: StreamPhase::Connecting,
            connected_at: Instant::now(),
            opened_at: None,
        }
    }

    /// Transition `Connecting → Open`
    pub fn open(&mut self) -> bool {
        if self.phase == StreamPhase::Connecting {
            self.phase = StreamPhase::Open;
            self.opened_at = Some(Instant::now());
            true
        } else {
            false
        }
    }

    /// Transition to `Closed`; only the first call records a reason
    pub fn close(&mut self, reason: CloseReason) -> bool {
        if self.phase == StreamPhase::Closed {
            return false;
        }
        tracing::trace!(reason = %reason, "Stream state closed");
        self.phase = StreamPhase::Closed;
        true
    }

    pub fn phase(&self) -> StreamPhase {
        self.phase
    }

    /// Time since the connection was accepted
    pub fn duration(&self) -> Duration {
        self.connected_at.elapsed()
    }

    /// Time spent open, if the stream ever opened
    pub fn open_duration(&self) -> Option<Duration> {
        self.opened_at.map(|t| t.elapsed())
    }
}

impl Default for StreamState {
    fn default() -> Self {
        Self::new()
    }
}

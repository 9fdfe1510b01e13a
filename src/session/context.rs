//! Stream context
//!
//! Per-connection information resolved before streaming begins, and the
//! counters reported when the stream closes.

use std::net::SocketAddr;

use crate::registry::{SubscriberId, SubscriptionKey};

/// Information about one streaming connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamContext {
    /// Unique session ID
    pub session_id: u64,

    /// Channel the connection subscribed to
    pub channel: String,

    /// Resolved subscriber identity
    pub subscriber: SubscriberId,

    /// Remote peer address, when the transport exposes one
    pub peer_addr: Option<SocketAddr>,
}

impl StreamContext {
    /// Create a new context
    pub fn new(session_id: u64, channel: impl Into<String>, subscriber: SubscriberId) -> Self {
        Self {
            session_id,
            channel: channel.into(),
            subscriber,
            peer_addr: None,
        }
    }

    /// Set the peer address
    pub fn with_peer(mut self, peer_addr: Option<SocketAddr>) -> Self {
        self.peer_addr = peer_addr;
        self
    }

    /// Subscription key this connection listens under
    pub fn key(&self) -> SubscriptionKey {
        SubscriptionKey::new(self.channel.as_str(), &self.subscriber)
    }
}

/// Per-session counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Frames written (connected, events, keep-alives)
    pub frames_written: u64,
    /// Bytes written
    pub bytes_written: u64,
    /// Events dropped before reaching the connection
    pub events_dropped: u64,
}

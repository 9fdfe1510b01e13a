//! Stream configuration

use std::time::Duration;

use crate::env::env_override;
use crate::error::ConfigError;

/// Per-connection streaming options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    /// Frames buffered between publishers and the connection
    pub queue_capacity: usize,

    /// Interval for keep-alive comments (None = disabled)
    pub heartbeat_interval: Option<Duration>,

    /// In-memory pipe size between a session and its HTTP response body
    pub pipe_capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 64,
            heartbeat_interval: Some(Duration::from_secs(15)),
            pipe_capacity: 16 * 1024, // 16KB
        }
    }
}

impl StreamConfig {
    /// Build from defaults overridden by environment variables
    ///
    /// - `LIVESYNC_QUEUE_CAPACITY` (default 64)
    /// - `LIVESYNC_HEARTBEAT_SECS` (default 15, 0 disables)
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(capacity) = env_override::<usize>("LIVESYNC_QUEUE_CAPACITY")? {
            config = config.queue_capacity(capacity);
        }
        if let Some(secs) = env_override::<u64>("LIVESYNC_HEARTBEAT_SECS")? {
            config = match secs {
                0 => config.disable_heartbeat(),
                secs => config.heartbeat(Duration::from_secs(secs)),
            };
        }

        Ok(config)
    }

    /// Set the outbound queue capacity (at least 1)
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Set the keep-alive interval
    pub fn heartbeat(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = Some(interval);
        self
    }

    /// Disable keep-alive comments
    pub fn disable_heartbeat(mut self) -> Self {
        self.heartbeat_interval = None;
        self
    }

    /// Set the response pipe size (at least 1 byte)
    pub fn pipe_capacity(mut self, capacity: usize) -> Self {
        self.pipe_capacity = capacity.max(1);
        self
    }
}

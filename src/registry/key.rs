//! Subscription key types
//!
//! A subscription is addressed by a channel and a subscriber identity. The key
//! is a real composite, so no choice of channel name can collide with another
//! (channel, subscriber) pair.

use serde::{Deserialize, Serialize};

/// Opaque identity of a logical recipient (usually a user id)
///
/// Integer and string identities never compare equal: `1` and `"1"` address
/// different subscriptions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SubscriberId {
    /// Numeric identity
    Int(i64),
    /// String identity
    Str(String),
}

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubscriberId::Int(id) => write!(f, "{}", id),
            SubscriberId::Str(id) => write!(f, "{:?}", id),
        }
    }
}

impl From<i64> for SubscriberId {
    fn from(id: i64) -> Self {
        SubscriberId::Int(id)
    }
}

impl From<i32> for SubscriberId {
    fn from(id: i32) -> Self {
        SubscriberId::Int(id.into())
    }
}

impl From<u32> for SubscriberId {
    fn from(id: u32) -> Self {
        SubscriberId::Int(id.into())
    }
}

impl From<String> for SubscriberId {
    fn from(id: String) -> Self {
        SubscriberId::Str(id)
    }
}

impl From<&str> for SubscriberId {
    fn from(id: &str) -> Self {
        SubscriberId::Str(id.to_owned())
    }
}

impl From<&SubscriberId> for SubscriberId {
    fn from(id: &SubscriberId) -> Self {
        id.clone()
    }
}

/// Unique identifier for a listener group (channel + subscriber)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubscriptionKey {
    /// Channel name (e.g., "todos")
    pub channel: String,
    /// Subscriber identity within the channel
    pub subscriber: SubscriberId,
}

impl SubscriptionKey {
    /// Create a new subscription key
    pub fn new(channel: impl Into<String>, subscriber: impl Into<SubscriberId>) -> Self {
        Self {
            channel: channel.into(),
            subscriber: subscriber.into(),
        }
    }
}

impl std::fmt::Display for SubscriptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.channel, self.subscriber)
    }
}

//! Events delivered to listeners
//!
//! An [`Event`] is what publishers hand to the registry and what each
//! connection serializes onto the wire via [`wire`].

pub mod wire;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use wire::{
    connected_frame, encode_comment, encode_event, keepalive_frame, EncodeError,
};

/// A live event
///
/// Field order matters: it is the key order of the JSON payload on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Event type (e.g., "todo.created")
    #[serde(rename = "type")]
    pub kind: String,

    /// Optional pre-rendered HTML fragment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,

    /// Arbitrary structured payload
    #[serde(default)]
    pub data: Value,
}

impl Event {
    /// Create an event with a JSON payload and no HTML
    pub fn new(kind: impl Into<String>, data: Value) -> Self {
        Self {
            kind: kind.into(),
            html: None,
            data,
        }
    }

    /// Create an event whose payload is any serializable value
    pub fn from_serialize<T: Serialize>(
        kind: impl Into<String>,
        data: &T,
    ) -> Result<Self, EncodeError> {
        Ok(Self::new(kind, serde_json::to_value(data)?))
    }

    /// Attach an HTML fragment
    pub fn with_html(mut self, html: impl Into<String>) -> Self {
        self.html = Some(html.into());
        self
    }
}

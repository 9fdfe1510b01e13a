//! Listener handles
//!
//! A listener represents one live delivery target, typically one open
//! connection. Each listener gets a process-unique id at construction; clones
//! share that id, which is what the registry uses to detect duplicates.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::event::Event;

use super::error::DeliveryError;

static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Get the raw id value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ListenerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

type Callback = dyn Fn(&Event) -> Result<(), DeliveryError> + Send + Sync;

/// A registered callback
///
/// Cheap to clone. The callback runs synchronously on the publisher's thread,
/// so it must not block; connection listeners only queue the encoded frame.
#[derive(Clone)]
pub struct Listener {
    id: ListenerId,
    callback: Arc<Callback>,
}

impl Listener {
    /// Create a listener from a callback
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&Event) -> Result<(), DeliveryError> + Send + Sync + 'static,
    {
        Self {
            id: ListenerId(NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed)),
            callback: Arc::new(callback),
        }
    }

    /// Get this listener's identity
    pub fn id(&self) -> ListenerId {
        self.id
    }

    pub(super) fn deliver(&self, event: &Event) -> Result<(), DeliveryError> {
        (self.callback)(event)
    }
}

impl std::fmt::Debug for Listener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listener").field("id", &self.id).finish()
    }
}

//! Per-key listener group
//!
//! This module defines the listener set stored in the registry for one
//! subscription key. The set keeps registration order and holds each
//! listener at most once.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use super::listener::{Listener, ListenerId};

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// One listener's presence in a group
///
/// `live` is cleared when the registration is removed. Publishers iterate over
/// snapshots taken under the lock and skip registrations already retired. A
/// call that passed the check may still overlap a concurrent unregister.
#[derive(Debug, Clone)]
pub(super) struct Registration {
    pub listener: Listener,
    pub token: u64,
    live: Arc<AtomicBool>,
}

impl Registration {
    fn new(listener: Listener) -> Self {
        Self {
            listener,
            token: NEXT_TOKEN.fetch_add(1, Ordering::Relaxed),
            live: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Whether the registration is still in the registry
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    fn retire(&self) {
        self.live.store(false, Ordering::Release);
    }
}

/// Listeners sharing one subscription key
#[derive(Debug, Default)]
pub(super) struct ListenerGroup {
    registrations: Vec<Registration>,
}

impl ListenerGroup {
    /// Add a listener, or return the existing registration token if the
    /// listener is already present
    pub fn insert(&mut self, listener: Listener) -> (u64, bool) {
        if let Some(existing) = self
            .registrations
            .iter()
            .find(|r| r.listener.id() == listener.id())
        {
            return (existing.token, false);
        }

        let registration = Registration::new(listener);
        let token = registration.token;
        self.registrations.push(registration);
        (token, true)
    }

    /// Remove the registration matching both listener id and token
    pub fn remove(&mut self, id: ListenerId, token: u64) -> bool {
        match self
            .registrations
            .iter()
            .position(|r| r.listener.id() == id && r.token == token)
        {
            Some(index) => {
                let registration = self.registrations.remove(index);
                registration.retire();
                true
            }
            None => false,
        }
    }

    /// Remove every registration, returning how many were dropped
    pub fn retire_all(&mut self) -> usize {
        let count = self.registrations.len();
        for registration in self.registrations.drain(..) {
            registration.retire();
        }
        count
    }

    /// Copy the current registrations in order
    pub fn snapshot(&self) -> Vec<Registration> {
        self.registrations.clone()
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }
}

/// Registry-wide counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    /// Channels with at least one listener
    pub channels: usize,
    /// Non-empty subscription keys
    pub keys: usize,
    /// Active listeners across all keys
    pub listeners: usize,
}

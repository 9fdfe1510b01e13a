//! Unregister handles

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Weak;

use super::key::SubscriptionKey;
use super::listener::ListenerId;
use super::store::Registry;

/// Handle returned by [`Registry::register`]
///
/// Calling [`unregister`](Self::unregister) removes exactly the registration
/// that produced this handle. Only the first call has an effect. The handle
/// holds a weak reference, so it never keeps the registry alive.
#[derive(Debug)]
#[must_use = "dropping the handle leaves the listener registered"]
pub struct Unregister {
    registry: Weak<Registry>,
    key: SubscriptionKey,
    listener: ListenerId,
    token: u64,
    done: AtomicBool,
}

impl Unregister {
    pub(super) fn new(
        registry: Weak<Registry>,
        key: SubscriptionKey,
        listener: ListenerId,
        token: u64,
    ) -> Self {
        Self {
            registry,
            key,
            listener,
            token,
            done: AtomicBool::new(false),
        }
    }

    /// Remove the listener from the registry
    ///
    /// Returns `true` if this call removed it; `false` if the handle was
    /// already used, the key was cleared, or the registry is gone.
    pub fn unregister(&self) -> bool {
        if self.done.swap(true, Ordering::AcqRel) {
            return false;
        }

        match self.registry.upgrade() {
            Some(registry) => registry.remove(&self.key, self.listener, self.token),
            None => false,
        }
    }

    /// Whether [`unregister`](Self::unregister) has been called
    pub fn is_unregistered(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    /// Key this handle's listener was registered under
    pub fn key(&self) -> &SubscriptionKey {
        &self.key
    }

    /// Identity of the registered listener
    pub fn listener_id(&self) -> ListenerId {
        self.listener
    }
}

//! Subscription registry implementation
//!
//! The central registry that maps subscription keys to live listeners and
//! routes published events to them.

use std::collections::{HashMap, HashSet};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::event::Event;

use super::entry::{ListenerGroup, Registration, RegistryStats};
use super::error::DeliveryError;
use super::handle::Unregister;
use super::key::{SubscriberId, SubscriptionKey};
use super::listener::{Listener, ListenerId};

type Channels = HashMap<String, HashMap<SubscriberId, ListenerGroup>>;

/// Central registry for all live subscriptions
///
/// Listeners are indexed by channel, then by subscriber, so channel-wide
/// publishes touch only that channel's keys. The lock is held to mutate the
/// map or to copy a listener snapshot, never while a listener runs.
#[derive(Debug, Default)]
pub struct Registry {
    channels: RwLock<Channels>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener under (channel, subscriber)
    ///
    /// Registering a listener that is already present under the same key keeps
    /// the single existing entry; the returned handle removes that entry.
    pub fn register(
        self: &Arc<Self>,
        channel: impl Into<String>,
        subscriber: impl Into<SubscriberId>,
        listener: Listener,
    ) -> Unregister {
        let key = SubscriptionKey::new(channel, subscriber);
        let listener_id = listener.id();

        let (token, added, listeners) = {
            let mut channels = self.channels.write();
            let group = channels
                .entry(key.channel.clone())
                .or_default()
                .entry(key.subscriber.clone())
                .or_default();
            let (token, added) = group.insert(listener);
            (token, added, group.len())
        };

        if added {
            tracing::debug!(
                key = %key,
                listener = %listener_id,
                listeners = listeners,
                "Listener registered"
            );
        } else {
            tracing::warn!(
                key = %key,
                listener = %listener_id,
                "Listener already registered under key"
            );
        }

        Unregister::new(Arc::downgrade(self), key, listener_id, token)
    }

    /// Remove one registration, dropping empty keys and channels
    pub(super) fn remove(&self, key: &SubscriptionKey, id: ListenerId, token: u64) -> bool {
        let (removed, remaining) = {
            let mut channels = self.channels.write();

            let Some(subscribers) = channels.get_mut(&key.channel) else {
                return false;
            };
            let Some(group) = subscribers.get_mut(&key.subscriber) else {
                return false;
            };

            let removed = group.remove(id, token);
            let remaining = group.len();

            if group.is_empty() {
                subscribers.remove(&key.subscriber);
                if subscribers.is_empty() {
                    channels.remove(&key.channel);
                }
            }

            (removed, remaining)
        };

        if removed {
            tracing::debug!(
                key = %key,
                listener = %id,
                listeners = remaining,
                "Listener unregistered"
            );
        }

        removed
    }

    /// Deliver an event to every listener under exactly (channel, subscriber)
    ///
    /// Listeners run on the caller's thread in registration order. Returns the
    /// number of successful deliveries; a key with no listeners is a no-op.
    pub fn publish_to_subscriber(
        &self,
        channel: &str,
        subscriber: impl Into<SubscriberId>,
        event: &Event,
    ) -> usize {
        let subscriber = subscriber.into();

        let snapshot = {
            let channels = self.channels.read();
            channels
                .get(channel)
                .and_then(|subscribers| subscribers.get(&subscriber))
                .map(ListenerGroup::snapshot)
        };

        match snapshot {
            Some(registrations) => deliver(channel, &subscriber, &registrations, event),
            None => 0,
        }
    }

    /// Deliver an event to every listener of every subscriber on `channel`
    ///
    /// The key set is read when the call is made. No order is defined across
    /// subscribers.
    pub fn publish_to_channel(&self, channel: &str, event: &Event) -> usize {
        let snapshot: Vec<(SubscriberId, Vec<Registration>)> = {
            let channels = self.channels.read();
            match channels.get(channel) {
                Some(subscribers) => subscribers
                    .iter()
                    .map(|(subscriber, group)| (subscriber.clone(), group.snapshot()))
                    .collect(),
                None => return 0,
            }
        };

        snapshot
            .iter()
            .map(|(subscriber, registrations)| deliver(channel, subscriber, registrations, event))
            .sum()
    }

    /// Number of listeners under (channel, subscriber), 0 if absent
    pub fn count_for(&self, channel: &str, subscriber: impl Into<SubscriberId>) -> usize {
        let subscriber = subscriber.into();
        self.channels
            .read()
            .get(channel)
            .and_then(|subscribers| subscribers.get(&subscriber))
            .map_or(0, ListenerGroup::len)
    }

    /// Number of listeners across all subscribers of a channel
    pub fn channel_count(&self, channel: &str) -> usize {
        self.channels
            .read()
            .get(channel)
            .map_or(0, |subscribers| subscribers.values().map(ListenerGroup::len).sum())
    }

    /// Total number of listeners
    pub fn count_total(&self) -> usize {
        self.channels
            .read()
            .values()
            .flat_map(|subscribers| subscribers.values())
            .map(ListenerGroup::len)
            .sum()
    }

    /// Snapshot of all keys with at least one listener
    pub fn list_active_keys(&self) -> HashSet<SubscriptionKey> {
        self.channels
            .read()
            .iter()
            .flat_map(|(channel, subscribers)| {
                subscribers
                    .keys()
                    .map(move |subscriber| SubscriptionKey::new(channel.as_str(), subscriber))
            })
            .collect()
    }

    /// Drop every listener under exactly (channel, subscriber)
    ///
    /// Returns the number of listeners dropped.
    pub fn clear_channel(&self, channel: &str, subscriber: impl Into<SubscriberId>) -> usize {
        let subscriber = subscriber.into();

        let group = {
            let mut channels = self.channels.write();
            let Some(subscribers) = channels.get_mut(channel) else {
                return 0;
            };
            let group = subscribers.remove(&subscriber);
            if subscribers.is_empty() {
                channels.remove(channel);
            }
            group
        };

        let dropped = group.map_or(0, |mut group| group.retire_all());
        if dropped > 0 {
            tracing::info!(
                channel = channel,
                subscriber = %subscriber,
                listeners = dropped,
                "Subscription cleared"
            );
        }
        dropped
    }

    /// Drop every key
    ///
    /// Returns the number of listeners dropped.
    pub fn clear_all(&self) -> usize {
        let channels = std::mem::take(&mut *self.channels.write());

        let dropped: usize = channels
            .into_values()
            .flat_map(|subscribers| subscribers.into_values())
            .map(|mut group| group.retire_all())
            .sum();

        tracing::info!(listeners = dropped, "Registry cleared");
        dropped
    }

    /// Get registry-wide counts
    pub fn stats(&self) -> RegistryStats {
        let channels = self.channels.read();
        let mut stats = RegistryStats {
            channels: channels.len(),
            ..Default::default()
        };
        for subscribers in channels.values() {
            stats.keys += subscribers.len();
            stats.listeners += subscribers.values().map(ListenerGroup::len).sum::<usize>();
        }
        stats
    }
}

/// Invoke each live registration, isolating failures per listener
fn deliver(
    channel: &str,
    subscriber: &SubscriberId,
    registrations: &[Registration],
    event: &Event,
) -> usize {
    let mut delivered = 0;

    for registration in registrations {
        // Removed after the snapshot was taken
        if !registration.is_live() {
            continue;
        }

        let listener = &registration.listener;
        match panic::catch_unwind(AssertUnwindSafe(|| listener.deliver(event))) {
            Ok(Ok(())) => delivered += 1,
            Ok(Err(DeliveryError::Closed)) => {
                tracing::debug!(
                    channel = channel,
                    subscriber = %subscriber,
                    listener = %listener.id(),
                    event_type = %event.kind,
                    "Listener closed, event dropped"
                );
            }
            Ok(Err(e)) => {
                tracing::warn!(
                    channel = channel,
                    subscriber = %subscriber,
                    listener = %listener.id(),
                    event_type = %event.kind,
                    error = %e,
                    "Delivery failed"
                );
            }
            Err(_) => {
                tracing::error!(
                    channel = channel,
                    subscriber = %subscriber,
                    listener = %listener.id(),
                    event_type = %event.kind,
                    "Listener panicked during delivery"
                );
            }
        }
    }

    delivered
}

//! Subscription registry for live event routing
//!
//! The registry maps (channel, subscriber) keys to the listeners of open
//! connections and routes published events to them.
//!
//! # Architecture
//!
//! ```text
//!                           Arc<Registry>
//!                  ┌──────────────────────────────┐
//!                  │ channels: HashMap<channel,   │
//!                  │   HashMap<subscriber,        │
//!                  │     ListenerGroup [L1, L2]   │
//!                  │   >                          │
//!                  │ >                            │
//!                  └──────────────┬───────────────┘
//!                                 │
//!         ┌───────────────────────┼───────────────────────┐
//!         │                       │                       │
//!         ▼                       ▼                       ▼
//!    [Publisher]             [Listener]              [Listener]
//!    publish_to_*()          encode + queue          encode + queue
//!         │                       │                       │
//!         └──► snapshot ──► call ─┴──► StreamSession ──► connection
//! ```
//!
//! # Locking
//!
//! Publishers copy the matching listener set under a read lock, release it,
//! then run the callbacks. A listener can block or call back into the
//! registry without stalling other publishers or registrations.

pub mod entry;
pub mod error;
pub mod global;
pub mod handle;
pub mod key;
pub mod listener;
pub mod store;

pub use entry::RegistryStats;
pub use error::{DeliveryError, RegistryError};
pub use global::{global, install_global};
pub use handle::Unregister;
pub use key::{SubscriberId, SubscriptionKey};
pub use listener::{Listener, ListenerId};
pub use store::Registry;

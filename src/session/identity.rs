//! Subscriber identity resolution
//!
//! A stream handler needs to know who is connecting before it registers a
//! listener. The strategy is supplied once, when the handler is built, and
//! must be a deterministic function of the request head.

use axum::http::request::Parts;

use crate::registry::SubscriberId;

/// Resolves the subscriber identity of an incoming stream request
pub trait IdentityResolver: Send + Sync + 'static {
    /// Identity for this request, or `None` if it cannot be determined
    fn resolve(&self, request: &Parts) -> Option<SubscriberId>;
}

impl<F> IdentityResolver for F
where
    F: Fn(&Parts) -> Option<SubscriberId> + Send + Sync + 'static,
{
    fn resolve(&self, request: &Parts) -> Option<SubscriberId> {
        self(request)
    }
}

/// Request-scoped identity set by authentication middleware
///
/// Insert it into the request extensions (for example from an
/// [`Authenticator`](crate::server::Authenticator)) and use
/// [`FromExtension`] to pick it up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentSubscriber(pub SubscriberId);

/// Reads [`CurrentSubscriber`] from the request extensions
#[derive(Debug, Clone, Copy, Default)]
pub struct FromExtension;

impl IdentityResolver for FromExtension {
    fn resolve(&self, request: &Parts) -> Option<SubscriberId> {
        request
            .extensions
            .get::<CurrentSubscriber>()
            .map(|current| current.0.clone())
    }
}

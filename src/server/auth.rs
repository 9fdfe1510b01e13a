//! Connection authentication hook
//!
//! Runs before a stream is opened. Implementations may reject the request, or
//! accept it and record who the caller is in the request extensions for the
//! identity resolver to pick up.

use std::future::Future;

use axum::http::request::Parts;

/// Outcome of authenticating a stream request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthResult {
    /// Open the stream
    Accept,
    /// Caller is not authenticated (401)
    Unauthorized(String),
    /// Caller may not read this channel (403)
    Forbidden(String),
}

/// Authentication step for stream requests
///
/// # Example
///
/// ```
/// use livesync::registry::SubscriberId;
/// use livesync::server::{AuthResult, Authenticator};
/// use livesync::session::CurrentSubscriber;
/// use axum::http::request::Parts;
///
/// struct HeaderToken;
///
/// impl Authenticator for HeaderToken {
///     async fn authenticate(&self, _channel: &str, request: &mut Parts) -> AuthResult {
///         let user = request
///             .headers
///             .get("x-user")
///             .and_then(|v| v.to_str().ok())
///             .map(str::to_owned);
///
///         match user {
///             Some(user) => {
///                 request.extensions.insert(CurrentSubscriber(SubscriberId::from(user)));
///                 AuthResult::Accept
///             }
///             None => AuthResult::Unauthorized("missing x-user".into()),
///         }
///     }
/// }
/// ```
pub trait Authenticator: Send + Sync + 'static {
    /// Decide whether the request may open a stream on `channel`
    fn authenticate(
        &self,
        channel: &str,
        request: &mut Parts,
    ) -> impl Future<Output = AuthResult> + Send;
}

/// Accepts every request
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl Authenticator for AllowAll {
    async fn authenticate(&self, _channel: &str, _request: &mut Parts) -> AuthResult {
        AuthResult::Accept
    }
}

//! The host environment a session runs inside.
//!
//! Keepsake doesn't speak HTTP. Whatever framework handles the request
//! implements [`HostContext`] to hand over the inbound cookie, headers and
//! parameters, and to take back the outbound cookie and cache headers.
//!
//! Tests implement it with a handful of hash maps.

use keepsake_config::RequestEnv;

use crate::Cookie;

/// Request/response access for one session.
///
/// The registration pair ([`register_session`](Self::register_session) /
/// [`release_session`](Self::release_session)) lets a host enforce one
/// active session per request. The defaults accept everything.
pub trait HostContext {
    /// Returns an inbound request header. Lookup is case-insensitive by
    /// convention; implementations decide.
    fn header(&self, name: &str) -> Option<&str>;

    /// Returns the value of an inbound cookie.
    fn cookie(&self, name: &str) -> Option<&str>;

    /// Returns a query-string parameter.
    fn query_param(&self, name: &str) -> Option<&str>;

    /// Returns a form-body parameter.
    fn body_param(&self, name: &str) -> Option<&str>;

    /// Returns `true` when the request arrived over a secure transport.
    fn is_secure(&self) -> bool;

    /// Returns `true` once response headers have been written.
    fn headers_sent(&self) -> bool {
        false
    }

    /// Claims the request's session slot. Returns `false` if it is taken.
    fn register_session(&mut self) -> bool {
        true
    }

    /// Frees the slot claimed by [`register_session`](Self::register_session).
    fn release_session(&mut self) {}

    /// Queues a `Set-Cookie` on the response.
    fn set_cookie(&mut self, cookie: &Cookie);

    /// Sets a response header, replacing any previous value.
    fn set_header(&mut self, name: &str, value: &str);

    /// What option resolution needs to know about this request.
    fn request_env(&self) -> RequestEnv {
        RequestEnv::new(self.header("host"), self.is_secure())
    }
}

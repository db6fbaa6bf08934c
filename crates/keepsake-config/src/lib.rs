//! Session option resolution for Keepsake.
//!
//! Turns what the application asked for ([`SessionConfig`]) plus what the
//! request looks like ([`RequestEnv`]) into one immutable
//! [`SessionOptions`] value that the session manager runs on.
//!
//! # Key types
//!
//! - [`SessionConfig`] — user options with documented defaults
//! - [`resolve`] / [`resolve_with`] — validation, clamping and derivation
//! - [`SessionOptions`] — the resolved result
//! - [`CacheLimiter`] — client-cache response headers
//! - [`HostNormalizer`] — host → cookie domain mapping

mod config;
mod error;
mod host;
mod limiter;
mod options;

pub use config::{CacheParams, CookieDomain, Driver, SessionConfig};
pub use error::ConfigError;
pub use host::{HostNormalizer, ParentDomain, strip_port};
pub use limiter::CacheLimiter;
pub use options::{RequestEnv, SessionOptions, resolve, resolve_with};

//! Storage backend contract for Keepsake.
//!
//! Provides the [`StorageBackend`] trait that session persistence is
//! written against, plus the small value types its methods exchange
//! ([`BackendParams`], [`RenewPolicy`]).
//!
//! Concrete production backends (filesystem, networked cache) live
//! outside this workspace. The only implementation shipped here is the
//! in-process [`MemoryBackend`].
//!
//! # Feature Flags
//!
//! - `memory` (default) — [`MemoryBackend`] and its shared [`MemoryPool`]

mod error;
#[cfg(feature = "memory")]
mod memory;

pub use error::StoreError;
#[cfg(feature = "memory")]
pub use memory::{MAX_LIFETIME, MemoryBackend, MemoryPool};

use std::fmt;
use std::path::PathBuf;

use keepsake_codec::SessionId;
use serde::{Deserialize, Serialize};

/// When a backend pushes an entry's expiry forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenewPolicy {
    /// Renew only when the stored blob actually changes. Read-only
    /// requests let the entry age.
    #[default]
    Lazy,
    /// Renew on every read and every write.
    Eager,
}

impl RenewPolicy {
    /// Maps the `auto_renew` option onto a policy.
    pub fn from_auto_renew(auto_renew: bool) -> Self {
        if auto_renew { Self::Eager } else { Self::Lazy }
    }

    /// Returns `true` if reads should renew the entry.
    pub fn renews_on_read(self) -> bool {
        matches!(self, Self::Eager)
    }
}

impl fmt::Display for RenewPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lazy => write!(f, "lazy"),
            Self::Eager => write!(f, "eager"),
        }
    }
}

/// Connection parameters handed to [`StorageBackend::open`].
///
/// Opaque to the session manager; each backend picks the variant it
/// understands and rejects the other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendParams {
    /// A directory holding one file per session.
    File {
        /// Directory the backend writes into.
        save_path: PathBuf,
    },
    /// A networked key/value cache.
    Cache {
        host: String,
        port: u16,
        db: u32,
        #[serde(default, skip_serializing_if = "String::is_empty")]
        password: String,
    },
}

impl Default for BackendParams {
    fn default() -> Self {
        Self::Cache {
            host: "127.0.0.1".to_string(),
            port: 6379,
            db: 0,
            password: String::new(),
        }
    }
}

/// Persists serialized working sets keyed by session identifier.
///
/// The session manager calls these methods synchronously and never
/// retries: a failed `write` is reported to the caller as `false` and
/// the request moves on. Timeouts, retries and connection pooling are
/// the backend's business.
///
/// Key prefixing is also the backend's business. The manager always
/// passes bare identifiers.
///
/// # Trait bounds
///
/// - `Send + 'static` → a session (and the backend it owns) may be moved
///   to whichever worker thread finishes the request.
pub trait StorageBackend: Send + 'static {
    /// A pre-built connection handle accepted by [`set_drive`](Self::set_drive).
    type Connection: Send;

    /// Establishes or validates backend readiness. Called once per
    /// session start, before any read.
    fn open(&mut self, params: &BackendParams, session_name: &str) -> Result<(), StoreError>;

    /// Releases per-request resources. Called after the final write.
    fn close(&mut self) -> Result<(), StoreError> {
        Ok(())
    }

    /// Returns the stored blob, or an empty vector if there is no live
    /// entry for `id`.
    fn read(&mut self, id: &SessionId) -> Result<Vec<u8>, StoreError>;

    /// Persists `data` under `id`, renewing the entry's expiry according
    /// to the backend's [`RenewPolicy`].
    fn write(&mut self, id: &SessionId, data: &[u8]) -> Result<(), StoreError>;

    /// Removes the entry for `id`. Removing a missing entry succeeds.
    fn destroy(&mut self, id: &SessionId) -> Result<(), StoreError>;

    /// Purges entries not written within `max_lifetime_secs`. Returns how
    /// many entries were removed. Backends with native expiry return 0.
    fn gc(&mut self, max_lifetime_secs: u64) -> Result<usize, StoreError>;

    /// Injects an already-established connection. Returns whether the
    /// backend accepted it.
    fn set_drive(&mut self, connection: Self::Connection) -> bool;

    /// The lifetime, in seconds, given to entries on write/renewal.
    fn ttl(&self) -> u64;

    /// Changes the entry lifetime. Returns whether the change was accepted.
    fn set_ttl(&mut self, seconds: u64) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renew_policy_from_auto_renew() {
        assert_eq!(RenewPolicy::from_auto_renew(true), RenewPolicy::Eager);
        assert_eq!(RenewPolicy::from_auto_renew(false), RenewPolicy::Lazy);
        assert!(RenewPolicy::Eager.renews_on_read());
        assert!(!RenewPolicy::Lazy.renews_on_read());
    }

    #[test]
    fn test_renew_policy_display() {
        assert_eq!(RenewPolicy::Lazy.to_string(), "lazy");
        assert_eq!(RenewPolicy::Eager.to_string(), "eager");
    }

    #[test]
    fn test_backend_params_default_is_local_cache() {
        let params = BackendParams::default();
        assert!(matches!(
            params,
            BackendParams::Cache { ref host, port: 6379, db: 0, .. } if host == "127.0.0.1"
        ));
    }
}

//! In-process storage backend.
//!
//! Entries live in a [`MemoryPool`], a cheaply cloneable handle to a
//! shared map. Each session gets its own [`MemoryBackend`]; backends that
//! share a pool see each other's writes, which is how several requests in
//! one process reach the same session.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use keepsake_codec::SessionId;
use parking_lot::Mutex;

use crate::{BackendParams, RenewPolicy, StorageBackend, StoreError};

/// Default entry lifetime (one day).
const DEFAULT_LIFETIME: Duration = Duration::from_secs(86_400);

/// Longest entry lifetime (about a century). Longer requests are capped.
pub const MAX_LIFETIME: Duration = Duration::from_secs(100 * 365 * 86_400);

/// Expiry instant for an entry written at `now`. Saturates at
/// [`MAX_LIFETIME`] instead of overflowing `Instant`.
fn expiry(now: Instant, lifetime: Duration) -> Instant {
    now.checked_add(lifetime.min(MAX_LIFETIME))
        .or_else(|| now.checked_add(MAX_LIFETIME))
        .unwrap_or(now)
}

#[derive(Debug, Clone)]
struct Entry {
    data: Vec<u8>,
    written_at: Instant,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }

    fn renew(&mut self, now: Instant, lifetime: Duration) {
        self.written_at = now;
        self.expires_at = expiry(now, lifetime);
    }
}

// ---------------------------------------------------------------------------
// MemoryPool
// ---------------------------------------------------------------------------

/// Shared storage for [`MemoryBackend`]s.
///
/// Cloning a pool clones the handle, not the data.
#[derive(Debug, Clone, Default)]
pub struct MemoryPool {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
}

impl MemoryPool {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, live or expired-but-not-collected.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns `true` if the pool holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Returns `true` if a live entry exists under the full storage key.
    pub fn contains_key(&self, key: &str) -> bool {
        let now = Instant::now();
        self.entries
            .lock()
            .get(key)
            .is_some_and(|e| e.is_live(now))
    }

    /// Returns a copy of the raw blob stored under the full storage key.
    pub fn raw(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.lock().get(key).map(|e| e.data.clone())
    }

    /// Time left before the entry under `key` expires.
    pub fn remaining(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        self.entries
            .lock()
            .get(key)
            .map(|e| e.expires_at.saturating_duration_since(now))
    }

    /// Removes every entry that has expired or was last written at least
    /// `max_age` ago. Returns the number removed.
    pub fn purge_older_than(&self, max_age: Duration) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, e| e.is_live(now) && now.duration_since(e.written_at) < max_age);
        before - entries.len()
    }
}

// ---------------------------------------------------------------------------
// MemoryBackend
// ---------------------------------------------------------------------------

/// A [`StorageBackend`] over a [`MemoryPool`].
///
/// Keys are `{prefix}{session id}`. Expiry follows the configured
/// [`RenewPolicy`]:
///
/// - `Eager` — every read and every write pushes expiry to now + ttl.
/// - `Lazy` — reads leave expiry alone; a write renews only when the
///   blob differs from what is stored.
#[derive(Debug)]
pub struct MemoryBackend {
    pool: Option<MemoryPool>,
    prefix: String,
    policy: RenewPolicy,
    lifetime: Duration,
}

impl MemoryBackend {
    /// Creates a backend with the given renewal policy and key prefix.
    ///
    /// The backend has no pool until [`set_drive`](StorageBackend::set_drive)
    /// hands it one; otherwise [`open`](StorageBackend::open) creates a
    /// private pool.
    pub fn new(policy: RenewPolicy, prefix: impl Into<String>) -> Self {
        Self {
            pool: None,
            prefix: prefix.into(),
            policy,
            lifetime: DEFAULT_LIFETIME,
        }
    }

    /// Creates a backend already attached to `pool`.
    pub fn with_pool(pool: MemoryPool, policy: RenewPolicy, prefix: impl Into<String>) -> Self {
        let mut backend = Self::new(policy, prefix);
        backend.pool = Some(pool);
        backend
    }

    /// Sets the entry lifetime, capped at [`MAX_LIFETIME`]. Accepts
    /// sub-second values for tests that need to watch an entry expire.
    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = lifetime.min(MAX_LIFETIME);
        self
    }

    /// The pool this backend reads and writes, if one is attached.
    pub fn pool(&self) -> Option<&MemoryPool> {
        self.pool.as_ref()
    }

    /// The renewal policy in effect.
    pub fn policy(&self) -> RenewPolicy {
        self.policy
    }

    /// Returns `true` if a live entry exists for `id`.
    pub fn contains(&self, id: &SessionId) -> bool {
        self.pool
            .as_ref()
            .is_some_and(|p| p.contains_key(&self.key(id)))
    }

    fn key(&self, id: &SessionId) -> String {
        format!("{}{}", self.prefix, id)
    }

    fn pool_or_err(&self) -> Result<&MemoryPool, StoreError> {
        self.pool.as_ref().ok_or(StoreError::NotOpen)
    }
}

impl StorageBackend for MemoryBackend {
    type Connection = MemoryPool;

    fn open(&mut self, params: &BackendParams, session_name: &str) -> Result<(), StoreError> {
        if self.pool.is_none() {
            tracing::debug!(session_name, ?params, "memory backend opening private pool");
            self.pool = Some(MemoryPool::new());
        }
        Ok(())
    }

    fn read(&mut self, id: &SessionId) -> Result<Vec<u8>, StoreError> {
        let key = self.key(id);
        let renew = self.policy.renews_on_read();
        let lifetime = self.lifetime;
        let now = Instant::now();

        let mut entries = self.pool_or_err()?.entries.lock();
        let expired = match entries.get_mut(&key) {
            Some(entry) if entry.is_live(now) => {
                if renew {
                    entry.renew(now, lifetime);
                }
                return Ok(entry.data.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.remove(&key);
            tracing::trace!(%key, "dropped expired entry on read");
        }
        Ok(Vec::new())
    }

    fn write(&mut self, id: &SessionId, data: &[u8]) -> Result<(), StoreError> {
        let key = self.key(id);
        let policy = self.policy;
        let lifetime = self.lifetime;
        let now = Instant::now();

        let mut entries = self.pool_or_err()?.entries.lock();
        match entries.get_mut(&key) {
            Some(entry) if entry.is_live(now) && entry.data == data => {
                if policy == RenewPolicy::Eager {
                    entry.renew(now, lifetime);
                }
            }
            _ => {
                entries.insert(
                    key,
                    Entry {
                        data: data.to_vec(),
                        written_at: now,
                        expires_at: expiry(now, lifetime),
                    },
                );
            }
        }
        Ok(())
    }

    fn destroy(&mut self, id: &SessionId) -> Result<(), StoreError> {
        let key = self.key(id);
        if let Some(pool) = &self.pool {
            pool.entries.lock().remove(&key);
        }
        Ok(())
    }

    fn gc(&mut self, max_lifetime_secs: u64) -> Result<usize, StoreError> {
        let removed = self
            .pool_or_err()?
            .purge_older_than(Duration::from_secs(max_lifetime_secs));
        if removed > 0 {
            tracing::debug!(removed, "memory backend gc");
        }
        Ok(removed)
    }

    fn set_drive(&mut self, connection: MemoryPool) -> bool {
        self.pool = Some(connection);
        true
    }

    fn ttl(&self) -> u64 {
        self.lifetime.as_secs()
    }

    fn set_ttl(&mut self, seconds: u64) -> bool {
        if seconds == 0 {
            return false;
        }
        let requested = Duration::from_secs(seconds);
        if requested > MAX_LIFETIME {
            tracing::debug!(seconds, "ttl capped at maximum lifetime");
        }
        self.lifetime = requested.min(MAX_LIFETIME);
        true
    }
}

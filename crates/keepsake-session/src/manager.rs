//! The session manager: one client's session for one request.
//!
//! [`Session`] owns everything a request needs: the resolved options, the
//! storage backend, the host context, the current identifier and the
//! in-memory working set. It is responsible for:
//! - Choosing the identifier (inbound cookie, URL parameter, or fresh)
//! - Loading the working set at start and flushing it at close
//! - Regenerating and destroying identifiers
//! - Emitting the session cookie and cache headers
//!
//! # Concurrency note
//!
//! `Session` has no internal locking: every mutating method takes
//! `&mut self`, and one request owns one session. Two requests for the
//! same identifier each load their own copy and the backend keeps
//! whichever flush lands last. There is no merge and no conflict
//! detection.

use keepsake_codec::{Codec, JsonCodec, SessionId, WorkingSet};
use keepsake_config::SessionOptions;
use keepsake_store::StorageBackend;
use rand::Rng;

use crate::{Cookie, HostContext, InitError, SessionError, SessionState};

/// A started session.
///
/// ## Lifecycle
///
/// ```text
/// start() ──→ [Active] ──→ get/set/del/data ... ──→ close() / drop
///                │                                     │
///                ├── regenerate_id() (stays Active)     ▼
///                ├── reset()    ──→ [Aborted]       write(working set)
///                └── destroy()  ──→ [Destroyed]
/// ```
///
/// Dropping an active session flushes it, the same as [`close`](Self::close),
/// unless the thread is panicking: a request that dies mid-way leaves the
/// stored entry as it was.
pub struct Session<B: StorageBackend, H: HostContext, C: Codec = JsonCodec> {
    pub(crate) options: SessionOptions,
    pub(crate) backend: B,
    pub(crate) host: H,
    pub(crate) codec: C,
    pub(crate) id: SessionId,
    /// The working set as mutated by the request.
    pub(crate) data: WorkingSet,
    /// The working set as loaded at start, restored by `reset()`.
    pub(crate) loaded: WorkingSet,
    pub(crate) state: SessionState,
}

impl<B: StorageBackend, H: HostContext> Session<B, H, JsonCodec> {
    /// Starts a session with the JSON codec.
    ///
    /// See [`start_with_codec`](Self::start_with_codec).
    pub fn start(options: SessionOptions, backend: B, host: H) -> Result<Self, SessionError> {
        Self::start_with_codec(options, backend, host, JsonCodec)
    }
}

impl<B: StorageBackend, H: HostContext, C: Codec> Session<B, H, C> {
    /// Registers `backend`, picks an identifier, loads its working set and
    /// sends the cookie.
    ///
    /// Identifier selection:
    /// 1. With `allow_url_transport`, a query (then body) parameter named
    ///    after the cookie that matches `^{prefix}[\w-]{22,32}$`, with the
    ///    key prefix stripped.
    /// 2. Otherwise the inbound cookie, if it is a well-formed identifier.
    /// 3. Otherwise a freshly generated identifier.
    ///
    /// In strict mode a client-supplied identifier with no stored data is
    /// replaced by a fresh one. A stored blob that fails to decode is
    /// logged and replaced by an empty working set.
    ///
    /// # Errors
    /// Returns [`SessionError::FatalInit`] if headers were already sent,
    /// the host refused registration, or the backend failed to open or
    /// read.
    pub fn start_with_codec(
        options: SessionOptions,
        mut backend: B,
        mut host: H,
        codec: C,
    ) -> Result<Self, SessionError> {
        if host.headers_sent() {
            return Err(InitError::HeadersSent.into());
        }
        if !host.register_session() {
            return Err(InitError::AlreadyActive.into());
        }

        if let Err(e) = backend.open(&options.backend_params, &options.cookie_name) {
            host.release_session();
            return Err(InitError::BackendOpen(e).into());
        }

        let supplied = inbound_id(&options, &host);
        let mut id = supplied.clone().unwrap_or_else(SessionId::generate);

        let blob = match backend.read(&id) {
            Ok(blob) => blob,
            Err(e) => {
                // Nothing was loaded, so there's nothing to flush; just
                // hand the backend back its resources.
                if let Err(close_err) = backend.close() {
                    tracing::warn!(error = %close_err, "backend close after failed read failed");
                }
                host.release_session();
                return Err(InitError::BackendRead(e).into());
            }
        };

        if options.strict_mode && supplied.is_some() && blob.is_empty() {
            tracing::debug!(rejected = %id, "strict mode: unknown client session id replaced");
            id = SessionId::generate();
        }

        let data = codec.decode_set(&blob).unwrap_or_else(|e| {
            tracing::warn!(session_id = %id, error = %e, "stored session undecodable, starting empty");
            WorkingSet::new()
        });

        let mut session = Self {
            loaded: data.clone(),
            data,
            options,
            backend,
            host,
            codec,
            id,
            state: SessionState::Active,
        };

        session.maybe_gc();

        if session.host.cookie(&session.options.cookie_name) != Some(session.id.as_str()) {
            session.send_cookie();
        }
        session.send_cache_headers();

        tracing::info!(
            session_id = %session.id,
            resumed = !session.loaded.is_empty(),
            "session started"
        );
        Ok(session)
    }

    // -- Identifier -------------------------------------------------------

    /// Returns the current session identifier.
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Replaces the identifier with a fresh one and returns it.
    ///
    /// The old identifier's stored entry is destroyed; left alone it would
    /// linger until natural expiry. The in-memory working set carries over
    /// and is written under the new identifier at close. A new cookie is
    /// sent.
    ///
    /// Does nothing (and returns the current identifier) if the session
    /// is no longer active or response headers are already out.
    pub fn regenerate_id(&mut self) -> &SessionId {
        if self.state != SessionState::Active {
            tracing::warn!(session_id = %self.id, state = %self.state, "regenerate on inactive session ignored");
            return &self.id;
        }
        if self.host.headers_sent() {
            tracing::warn!(session_id = %self.id, "regenerate after headers sent ignored");
            return &self.id;
        }

        let old = std::mem::replace(&mut self.id, SessionId::generate());
        if let Err(e) = self.backend.destroy(&old) {
            tracing::warn!(old_id = %old, error = %e, "failed to discard old session entry");
        }
        self.send_cookie();

        tracing::info!(old_id = %old, session_id = %self.id, "session id regenerated");
        &self.id
    }

    /// Returns the identifier, regenerating it first when `create_new` is set.
    pub fn id_with(&mut self, create_new: bool) -> &SessionId {
        if create_new {
            self.regenerate_id()
        } else {
            &self.id
        }
    }

    // -- Backend delegation ----------------------------------------------

    /// The backend's current entry lifetime, in seconds.
    pub fn ttl(&self) -> u64 {
        self.backend.ttl()
    }

    /// Asks the backend to use a new entry lifetime. Returns whether the
    /// backend accepted it.
    pub fn set_ttl(&mut self, seconds: u64) -> bool {
        self.backend.set_ttl(seconds)
    }

    /// Hands an already-established connection to the backend. Returns
    /// whether the backend accepted it.
    pub fn set_drive(&mut self, connection: B::Connection) -> bool {
        self.backend.set_drive(connection)
    }

    // -- Teardown ---------------------------------------------------------

    /// Clears the working set and destroys the stored entry.
    pub fn empty(&mut self) -> bool {
        self.data.clear();
        self.destroy()
    }

    /// Discards every change made during this request. The working set
    /// goes back to what was loaded and nothing is written at close.
    ///
    /// Returns `false` if the session wasn't active.
    pub fn reset(&mut self) -> bool {
        if self.state != SessionState::Active {
            return false;
        }
        self.data = self.loaded.clone();
        self.state = SessionState::Aborted;
        tracing::debug!(session_id = %self.id, "session changes discarded");
        true
    }

    /// Destroys the stored entry for the current identifier. Nothing is
    /// written at close. Destroying an already-missing entry succeeds.
    pub fn destroy(&mut self) -> bool {
        match self.backend.destroy(&self.id) {
            Ok(()) => {
                if self.state != SessionState::Closed {
                    self.state = SessionState::Destroyed;
                }
                tracing::info!(session_id = %self.id, "session destroyed");
                true
            }
            Err(e) => {
                tracing::warn!(session_id = %self.id, error = %e, "session destroy failed");
                false
            }
        }
    }

    /// Ends the request: writes the working set back (if still active),
    /// closes the backend and releases the host's session slot.
    ///
    /// Returns `false` if the write failed.
    pub fn close(mut self) -> bool {
        self.finish(true)
    }

    /// Runs at most once: the state is `Closed` before anything that can
    /// fail, so `Drop` never retries a flush that already blew up.
    fn finish(&mut self, flush: bool) -> bool {
        let state = std::mem::replace(&mut self.state, SessionState::Closed);
        if state == SessionState::Closed {
            return true;
        }

        let written = if state.flushes_on_close() {
            if flush {
                self.flush()
            } else {
                tracing::warn!(session_id = %self.id, "request aborted, session changes not written");
                false
            }
        } else {
            true
        };

        if let Err(e) = self.backend.close() {
            tracing::warn!(session_id = %self.id, error = %e, "backend close failed");
        }
        self.host.release_session();
        written
    }

    fn flush(&mut self) -> bool {
        let blob = match self.codec.encode_set(&self.data) {
            Ok(blob) => blob,
            Err(e) => {
                tracing::warn!(session_id = %self.id, error = %e, "session encode failed");
                return false;
            }
        };
        match self.backend.write(&self.id, &blob) {
            Ok(()) => {
                tracing::debug!(session_id = %self.id, bytes = blob.len(), "session flushed");
                true
            }
            Err(e) => {
                tracing::warn!(session_id = %self.id, error = %e, "session write failed");
                false
            }
        }
    }

    // -- Introspection ----------------------------------------------------

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Returns `true` while changes will still be written at close.
    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }

    /// The resolved options this session runs on.
    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// The in-memory working set, including null (deleted) markers.
    pub fn working_set(&self) -> &WorkingSet {
        &self.data
    }

    /// The storage backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The host context.
    pub fn host(&self) -> &H {
        &self.host
    }

    /// Mutable access to the host context.
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    // -- Internals --------------------------------------------------------

    fn send_cookie(&mut self) {
        let cookie = Cookie::for_session(&self.options, &self.id);
        self.host.set_cookie(&cookie);
    }

    fn send_cache_headers(&mut self) {
        let headers = self
            .options
            .cache_limiter
            .headers(self.options.cache_expire_minutes, chrono::Utc::now());
        for (name, value) in headers {
            self.host.set_header(name, &value);
        }
    }

    /// Runs backend gc with probability `gc_probability / gc_divisor`.
    fn maybe_gc(&mut self) {
        let (probability, divisor) = (self.options.gc_probability, self.options.gc_divisor);
        if probability == 0 || divisor == 0 {
            return;
        }
        if rand::rng().random_range(0..divisor) >= probability {
            return;
        }
        match self.backend.gc(self.options.data_lifetime) {
            Ok(removed) => tracing::debug!(removed, "session gc ran"),
            Err(e) => tracing::warn!(error = %e, "session gc failed"),
        }
    }
}

impl<B: StorageBackend, H: HostContext, C: Codec> Drop for Session<B, H, C> {
    fn drop(&mut self) {
        self.finish(!std::thread::panicking());
    }
}

impl<B: StorageBackend, H: HostContext, C: Codec> std::fmt::Debug for Session<B, H, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("keys", &self.data.len())
            .finish_non_exhaustive()
    }
}

/// Finds a usable identifier supplied by the client.
fn inbound_id<H: HostContext>(options: &SessionOptions, host: &H) -> Option<SessionId> {
    let name = options.cookie_name.as_str();

    if options.allow_url_transport {
        let from_url = [host.query_param(name), host.body_param(name)]
            .into_iter()
            .flatten()
            .find_map(|candidate| options.url_id(candidate));
        if let Some(raw) = from_url {
            match SessionId::parse(raw) {
                Ok(id) => {
                    tracing::debug!(session_id = %id, "adopted session id from request parameter");
                    return Some(id);
                }
                Err(e) => tracing::warn!(error = %e, "url session id matched pattern but failed to parse"),
            }
        }
    }

    host.cookie(name).and_then(|raw| SessionId::parse(raw).ok())
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! Unit tests for the lifecycle half of `Session`.
    //!
    //! Naming: `test_{function}_{scenario}_{expected}`. The typed accessor
    //! half is covered in `access.rs`; full request round-trips live in
    //! `tests/lifecycle.rs`.

    use std::collections::HashMap;

    use keepsake_config::{RequestEnv, SessionConfig, resolve};
    use keepsake_store::{MemoryBackend, MemoryPool, RenewPolicy};

    use super::*;

    // -- Helpers ----------------------------------------------------------

    #[derive(Default)]
    struct StubHost {
        cookies: HashMap<String, String>,
        query: HashMap<String, String>,
        sent: Vec<Cookie>,
        headers: Vec<(String, String)>,
        headers_sent: bool,
        busy: bool,
    }

    impl HostContext for StubHost {
        fn header(&self, name: &str) -> Option<&str> {
            (name == "host").then_some("www.example.com")
        }
        fn cookie(&self, name: &str) -> Option<&str> {
            self.cookies.get(name).map(String::as_str)
        }
        fn query_param(&self, name: &str) -> Option<&str> {
            self.query.get(name).map(String::as_str)
        }
        fn body_param(&self, _name: &str) -> Option<&str> {
            None
        }
        fn is_secure(&self) -> bool {
            false
        }
        fn headers_sent(&self) -> bool {
            self.headers_sent
        }
        fn register_session(&mut self) -> bool {
            !std::mem::replace(&mut self.busy, true)
        }
        fn release_session(&mut self) {
            self.busy = false;
        }
        fn set_cookie(&mut self, cookie: &Cookie) {
            self.sent.push(cookie.clone());
        }
        fn set_header(&mut self, name: &str, value: &str) {
            self.headers.push((name.to_string(), value.to_string()));
        }
    }

    fn options(config: SessionConfig) -> SessionOptions {
        resolve(&config, &RequestEnv::new(Some("www.example.com"), false)).unwrap()
    }

    fn no_gc() -> SessionConfig {
        SessionConfig::default().with_gc(0, 100)
    }

    fn start(pool: &MemoryPool, host: StubHost) -> Session<MemoryBackend, StubHost> {
        let backend = MemoryBackend::with_pool(pool.clone(), RenewPolicy::Lazy, "");
        Session::start(options(no_gc()), backend, host).expect("start should succeed")
    }

    // =====================================================================
    // start()
    // =====================================================================

    #[test]
    fn test_start_without_cookie_generates_id_and_sends_cookie() {
        let pool = MemoryPool::new();
        let session = start(&pool, StubHost::default());

        assert_eq!(session.id().as_str().len(), SessionId::GENERATED_LEN);
        assert!(session.is_active());
        let sent = &session.host().sent;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].value, session.id().as_str());
    }

    #[test]
    fn test_start_with_cookie_reuses_id_without_resending() {
        let pool = MemoryPool::new();
        let mut host = StubHost::default();
        host.cookies.insert("phpsessid".into(), "existingSessionId42".into());

        let session = start(&pool, host);

        assert_eq!(session.id().as_str(), "existingSessionId42");
        assert!(session.host().sent.is_empty());
    }

    #[test]
    fn test_start_with_malformed_cookie_generates_new_id() {
        let pool = MemoryPool::new();
        let mut host = StubHost::default();
        host.cookies.insert("phpsessid".into(), "../../etc/passwd".into());

        let session = start(&pool, host);

        assert_ne!(session.id().as_str(), "../../etc/passwd");
        assert_eq!(session.host().sent.len(), 1);
    }

    #[test]
    fn test_start_headers_sent_returns_fatal_init() {
        let host = StubHost {
            headers_sent: true,
            ..StubHost::default()
        };
        let result = Session::start(
            options(no_gc()),
            MemoryBackend::new(RenewPolicy::Lazy, ""),
            host,
        );
        assert!(matches!(
            result,
            Err(SessionError::FatalInit(InitError::HeadersSent))
        ));
    }

    #[test]
    fn test_start_host_busy_returns_already_active() {
        let host = StubHost {
            busy: true,
            ..StubHost::default()
        };
        let result = Session::start(
            options(no_gc()),
            MemoryBackend::new(RenewPolicy::Lazy, ""),
            host,
        );
        assert!(matches!(
            result,
            Err(SessionError::FatalInit(InitError::AlreadyActive))
        ));
    }

    #[test]
    fn test_start_sends_nocache_headers() {
        let pool = MemoryPool::new();
        let session = start(&pool, StubHost::default());

        let headers = &session.host().headers;
        assert!(headers.iter().any(|(n, v)| n == "Pragma" && v == "no-cache"));
    }

    #[test]
    fn test_start_undecodable_blob_starts_empty() {
        let pool = MemoryPool::new();
        let id = SessionId::parse("corruptSession").unwrap();
        let mut writer = MemoryBackend::with_pool(pool.clone(), RenewPolicy::Lazy, "");
        writer.open(&Default::default(), "x").unwrap();
        writer.write(&id, b"not json at all").unwrap();

        let mut host = StubHost::default();
        host.cookies.insert("phpsessid".into(), id.to_string());
        let session = start(&pool, host);

        assert_eq!(session.id(), &id);
        assert!(session.working_set().is_empty());
    }

    // =====================================================================
    // regenerate_id()
    // =====================================================================

    #[test]
    fn test_regenerate_id_changes_id_and_resends_cookie() {
        let pool = MemoryPool::new();
        let mut session = start(&pool, StubHost::default());
        let first = session.id().clone();

        let second = session.regenerate_id().clone();

        assert_ne!(first, second);
        let sent = &session.host().sent;
        assert_eq!(sent.last().unwrap().value, second.as_str());
    }

    #[test]
    fn test_regenerate_id_after_reset_is_ignored() {
        let pool = MemoryPool::new();
        let mut session = start(&pool, StubHost::default());
        let first = session.id().clone();
        session.reset();

        assert_eq!(session.regenerate_id(), &first);
    }

    #[test]
    fn test_id_with_false_keeps_id() {
        let pool = MemoryPool::new();
        let mut session = start(&pool, StubHost::default());
        let first = session.id().clone();

        assert_eq!(session.id_with(false), &first);
        assert_ne!(session.id_with(true), &first);
    }

    // =====================================================================
    // reset() / destroy() / close()
    // =====================================================================

    #[test]
    fn test_reset_twice_returns_false_second_time() {
        let pool = MemoryPool::new();
        let mut session = start(&pool, StubHost::default());

        assert!(session.reset());
        assert!(!session.reset());
        assert_eq!(session.state(), SessionState::Aborted);
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let pool = MemoryPool::new();
        let mut session = start(&pool, StubHost::default());

        assert!(session.destroy());
        assert!(session.destroy());
        assert_eq!(session.state(), SessionState::Destroyed);
    }

    #[test]
    fn test_close_writes_under_current_id() {
        let pool = MemoryPool::new();
        let session = start(&pool, StubHost::default());
        let id = session.id().clone();

        assert!(session.close());
        assert_eq!(pool.raw(id.as_str()).as_deref(), Some(&b"{}"[..]));
    }

    #[test]
    fn test_drop_flushes_active_session() {
        let pool = MemoryPool::new();
        let id = {
            let session = start(&pool, StubHost::default());
            session.id().clone()
        };
        assert!(pool.contains_key(id.as_str()));
    }

    #[test]
    fn test_drop_while_panicking_skips_flush() {
        let pool = MemoryPool::new();
        let mut first = start(&pool, StubHost::default());
        first.set("balance", 100);
        let id = first.id().clone();
        assert!(first.close());

        let mut host = StubHost::default();
        host.cookies.insert("phpsessid".into(), id.to_string());
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let mut second = start(&pool, host);
            second.set("balance", 0);
            panic!("request handler failed");
        }));

        assert!(result.is_err());
        assert_eq!(pool.raw(id.as_str()).as_deref(), Some(&br#"{"balance":100}"#[..]));
    }

    #[test]
    fn test_close_with_huge_ttl_writes_once() {
        let pool = MemoryPool::new();
        let mut session = start(&pool, StubHost::default());
        let id = session.id().clone();

        assert!(session.set_ttl(u64::MAX));
        session.set("a", 1);
        assert!(session.close());
        assert!(pool.contains_key(id.as_str()));
    }

    #[test]
    fn test_ttl_delegates_to_backend() {
        let pool = MemoryPool::new();
        let mut session = start(&pool, StubHost::default());

        assert_eq!(session.ttl(), 86_400);
        assert!(session.set_ttl(120));
        assert_eq!(session.ttl(), 120);
        assert!(!session.set_ttl(0));
    }
}

//! `SessionBuilder`: configure once, start a session per request.

use std::fmt;
use std::time::Duration;

use keepsake_config::{HostNormalizer, ParentDomain, RequestEnv, SessionConfig, SessionOptions, resolve_with};
use keepsake_session::{HostContext, Session};
use keepsake_store::{MemoryBackend, MemoryPool, StorageBackend};

use crate::KeepsakeError;

/// Holds the application's session configuration and starts sessions
/// from it.
///
/// Options are resolved per request, since the cookie domain and
/// `Secure` flag depend on the inbound request.
///
/// # Example
///
/// ```rust,ignore
/// use keepsake::prelude::*;
///
/// let builder = SessionBuilder::from_json(r#"{"cookie_name": "SID", "data_lifetime": 3600}"#)?;
/// let mut session = builder.start(my_backend, my_host)?;
/// ```
pub struct SessionBuilder {
    config: SessionConfig,
    normalizer: Box<dyn HostNormalizer + Send + Sync>,
}

impl SessionBuilder {
    /// Creates a builder with default settings.
    pub fn new() -> Self {
        Self {
            config: SessionConfig::default(),
            normalizer: Box::new(ParentDomain),
        }
    }

    /// Creates a builder from a JSON options document.
    pub fn from_json(json: &str) -> Result<Self, KeepsakeError> {
        Ok(Self::new().config(SessionConfig::from_json(json)?))
    }

    /// Sets the session configuration.
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Replaces the host normalizer used for `"host"` cookie domains.
    pub fn normalizer(mut self, normalizer: impl HostNormalizer + Send + Sync + 'static) -> Self {
        self.normalizer = Box::new(normalizer);
        self
    }

    /// The configuration sessions are started from.
    pub fn session_config(&self) -> &SessionConfig {
        &self.config
    }

    /// Resolves the options for one request.
    pub fn options_for(&self, env: &RequestEnv) -> Result<SessionOptions, KeepsakeError> {
        Ok(resolve_with(&self.config, env, &*self.normalizer)?)
    }

    /// Resolves options against `host` and starts a session on `backend`.
    pub fn start<B, H>(&self, backend: B, host: H) -> Result<Session<B, H>, KeepsakeError>
    where
        B: StorageBackend,
        H: HostContext,
    {
        let options = self.options_for(&host.request_env())?;
        Ok(Session::start(options, backend, host)?)
    }

    /// Starts a session on an in-memory backend over `pool`.
    ///
    /// The backend gets the configured renewal policy and key prefix, and
    /// its entry lifetime is the data lifetime.
    pub fn start_memory<H: HostContext>(
        &self,
        pool: &MemoryPool,
        host: H,
    ) -> Result<Session<MemoryBackend, H>, KeepsakeError> {
        let options = self.options_for(&host.request_env())?;
        let backend = MemoryBackend::with_pool(
            pool.clone(),
            options.renew_policy(),
            options.key_prefix.clone(),
        )
        .with_lifetime(Duration::from_secs(options.data_lifetime));

        tracing::trace!(policy = %options.renew_policy(), "starting memory-backed session");
        Ok(Session::start(options, backend, host)?)
    }
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SessionBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionBuilder")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

//! Resolution of a [`SessionConfig`] into immutable [`SessionOptions`].

use keepsake_store::{BackendParams, RenewPolicy};
use regex::Regex;

use crate::host::{HostNormalizer, ParentDomain, strip_port};
use crate::{CacheLimiter, ConfigError, CookieDomain, Driver, SessionConfig};

/// What the resolver needs to know about the inbound request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestEnv {
    /// Raw `Host` header, possibly with a port.
    pub host: Option<String>,
    /// `true` when the request arrived over HTTPS.
    pub secure: bool,
}

impl RequestEnv {
    pub fn new(host: Option<&str>, secure: bool) -> Self {
        Self {
            host: host.map(str::to_string),
            secure,
        }
    }
}

/// Fully resolved session options.
///
/// Produced once per session by [`resolve`] and never mutated afterwards;
/// the session manager only hands out shared references.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub driver: Driver,
    /// Lowercased, alphanumeric.
    pub cookie_name: String,
    pub auto_renew: bool,
    pub key_prefix: String,
    pub cookie_path: String,
    /// Resolved domain. Empty means a host-only cookie.
    pub cookie_domain: String,
    pub cache_limiter: CacheLimiter,
    pub cache_expire_minutes: u64,
    pub data_lifetime: u64,
    /// Never below `data_lifetime`.
    pub cookie_lifetime: u64,
    pub cookie_secure: bool,
    pub cookie_http_only: bool,
    /// Always `"Lax"`.
    pub cookie_same_site: Option<&'static str>,
    pub allow_url_transport: bool,
    /// `^{prefix}[\w-]{22,32}$`, compiled only when URL transport is on.
    pub url_id_pattern: Option<Regex>,
    pub strict_mode: bool,
    pub gc_probability: u32,
    pub gc_divisor: u32,
    pub backend_params: BackendParams,
}

impl SessionOptions {
    /// The backend renewal policy implied by `auto_renew`.
    pub fn renew_policy(&self) -> RenewPolicy {
        RenewPolicy::from_auto_renew(self.auto_renew)
    }

    /// Returns `true` if `candidate` may be adopted as an identifier from
    /// a URL or body parameter.
    pub fn accepts_url_id(&self, candidate: &str) -> bool {
        self.url_id_pattern
            .as_ref()
            .is_some_and(|re| re.is_match(candidate))
    }

    /// The identifier carried by an accepted URL or body parameter.
    ///
    /// The parameter holds the storage key (`{key_prefix}{id}`); the
    /// prefix is stripped so the backend doesn't apply it twice. Returns
    /// `None` when [`accepts_url_id`](Self::accepts_url_id) would refuse
    /// `candidate`.
    pub fn url_id<'a>(&self, candidate: &'a str) -> Option<&'a str> {
        if !self.accepts_url_id(candidate) {
            return None;
        }
        candidate.strip_prefix(self.key_prefix.as_str())
    }
}

/// Resolves `config` against the inbound request using [`ParentDomain`]
/// for `"host"` cookie domains.
pub fn resolve(config: &SessionConfig, env: &RequestEnv) -> Result<SessionOptions, ConfigError> {
    resolve_with(config, env, &ParentDomain)
}

/// Resolves `config` with a caller-provided host normalizer.
///
/// Steps, in order:
///
/// 1. Validate lifetimes, path and gc ratio.
/// 2. Raise `cookie_lifetime` to `data_lifetime` if it is shorter, so the
///    client never drops a cookie whose data is still alive server-side.
/// 3. Lowercase and validate the cookie name.
/// 4. Derive the cookie domain from the `Host` header.
/// 5. `cache_expire_minutes = data_lifetime / 60`.
/// 6. `Secure` from the request, `HttpOnly` always, `SameSite=Lax`.
/// 7. Compile the URL identifier pattern when URL transport is allowed.
///
/// # Errors
/// Returns a [`ConfigError`] for structurally invalid options.
pub fn resolve_with(
    config: &SessionConfig,
    env: &RequestEnv,
    normalizer: &dyn HostNormalizer,
) -> Result<SessionOptions, ConfigError> {
    if config.data_lifetime == 0 {
        return Err(ConfigError::InvalidLifetime);
    }
    if !config.cookie_path.starts_with('/') {
        return Err(ConfigError::InvalidPath(config.cookie_path.clone()));
    }
    if config.gc_divisor == 0 || config.gc_probability > config.gc_divisor {
        return Err(ConfigError::InvalidGcRatio {
            probability: config.gc_probability,
            divisor: config.gc_divisor,
        });
    }

    let mut cookie_lifetime = config.cookie_lifetime;
    if cookie_lifetime < config.data_lifetime {
        tracing::debug!(
            cookie_lifetime,
            data_lifetime = config.data_lifetime,
            "cookie lifetime shorter than data lifetime, raising"
        );
        cookie_lifetime = config.data_lifetime;
    }

    let cookie_name = config.cookie_name.to_ascii_lowercase();
    if cookie_name.is_empty() || !cookie_name.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return Err(ConfigError::InvalidCookieName(config.cookie_name.clone()));
    }

    let request_host = env.host.as_deref().map(strip_port).unwrap_or_default();
    let cookie_domain = match &config.cookie_domain {
        CookieDomain::Host if request_host.is_empty() => String::new(),
        CookieDomain::Host => normalizer.registrable_domain(request_host),
        CookieDomain::Domain => request_host.to_string(),
        CookieDomain::Literal(domain) => domain.clone(),
    };

    let url_id_pattern = if config.allow_url_transport {
        let pattern = format!(r"^{}[A-Za-z0-9_-]{{22,32}}$", regex::escape(&config.key_prefix));
        Some(Regex::new(&pattern)?)
    } else {
        None
    };

    Ok(SessionOptions {
        driver: config.driver,
        cookie_name,
        auto_renew: config.auto_renew,
        key_prefix: config.key_prefix.clone(),
        cookie_path: config.cookie_path.clone(),
        cookie_domain,
        cache_limiter: config.cache_limiter,
        cache_expire_minutes: config.data_lifetime / 60,
        data_lifetime: config.data_lifetime,
        cookie_lifetime,
        cookie_secure: env.secure,
        cookie_http_only: true,
        cookie_same_site: Some("Lax"),
        allow_url_transport: config.allow_url_transport,
        url_id_pattern,
        strict_mode: config.strict_mode,
        gc_probability: config.gc_probability,
        gc_divisor: config.gc_divisor,
        backend_params: config.backend_params(),
    })
}

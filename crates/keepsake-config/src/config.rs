//! User-facing session configuration and its defaults.

use std::fmt;
use std::path::PathBuf;

use keepsake_store::BackendParams;
use serde::{Deserialize, Serialize};

use crate::{CacheLimiter, ConfigError};

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

/// Which kind of storage backend the options are prepared for.
///
/// The driver only decides which [`BackendParams`] variant is built. The
/// backend itself is constructed by the caller and injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Driver {
    /// One file per session in a directory.
    File,
    /// A networked key/value cache.
    #[default]
    Cache,
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File => write!(f, "file"),
            Self::Cache => write!(f, "cache"),
        }
    }
}

// ---------------------------------------------------------------------------
// CookieDomain
// ---------------------------------------------------------------------------

/// How the cookie `Domain` attribute is chosen.
///
/// In configuration this is a plain string: `"host"`, `"domain"`, or any
/// other value taken literally.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CookieDomain {
    /// The parent registrable domain of the request host
    /// (`www.example.com` → `example.com`), so the cookie is shared by
    /// every subdomain.
    #[default]
    Host,
    /// The request host exactly, port stripped.
    Domain,
    /// A fixed value. Empty means a host-only cookie.
    Literal(String),
}

impl From<String> for CookieDomain {
    fn from(s: String) -> Self {
        match s.as_str() {
            "host" => Self::Host,
            "domain" => Self::Domain,
            _ => Self::Literal(s),
        }
    }
}

impl From<CookieDomain> for String {
    fn from(d: CookieDomain) -> Self {
        match d {
            CookieDomain::Host => "host".to_string(),
            CookieDomain::Domain => "domain".to_string(),
            CookieDomain::Literal(s) => s,
        }
    }
}

// ---------------------------------------------------------------------------
// CacheParams
// ---------------------------------------------------------------------------

/// Connection settings for the networked cache driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheParams {
    pub host: String,
    pub port: u16,
    pub db: u32,
    pub password: String,
}

impl Default for CacheParams {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            db: 0,
            password: String::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Session options as supplied by the application.
///
/// Every field has a default, so a partial JSON document deserializes
/// into a complete config: omitted keys take the defaults below, unknown
/// keys are ignored. Nothing here is validated yet; that happens in
/// [`resolve`](crate::resolve).
///
/// | field                 | default        |
/// |-----------------------|----------------|
/// | `driver`              | `cache`        |
/// | `cookie_name`         | `"PHPSESSID"`  |
/// | `auto_renew`          | `false`        |
/// | `key_prefix`          | `""`           |
/// | `cookie_path`         | `"/"`          |
/// | `cookie_domain`       | `"host"`       |
/// | `cache_limiter`       | `nocache`      |
/// | `data_lifetime`       | `86400`        |
/// | `cookie_lifetime`     | `86400`        |
/// | `allow_url_transport` | `false`        |
/// | `strict_mode`         | `false`        |
/// | `gc_probability`      | `1`            |
/// | `gc_divisor`          | `100`          |
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Backend kind the connection parameters are built for.
    pub driver: Driver,

    /// Cookie (and URL parameter) name. Lowercased during resolution.
    pub cookie_name: String,

    /// Renew the stored entry's TTL on every access instead of only when
    /// its content changes.
    pub auto_renew: bool,

    /// Namespace prepended to storage keys by the backend.
    pub key_prefix: String,

    /// Cookie `Path` attribute.
    pub cookie_path: String,

    /// Cookie `Domain` attribute mode.
    pub cookie_domain: CookieDomain,

    /// Client-cache headers sent with session responses.
    pub cache_limiter: CacheLimiter,

    /// Seconds stored data stays valid.
    pub data_lifetime: u64,

    /// Seconds the client keeps the cookie. Raised to `data_lifetime`
    /// when shorter.
    pub cookie_lifetime: u64,

    /// Accept an identifier from a query or body parameter.
    /// Off by default; URL-borne identifiers enable session fixation.
    pub allow_url_transport: bool,

    /// Replace client-supplied identifiers that have no stored data.
    pub strict_mode: bool,

    /// Chance (`gc_probability / gc_divisor`) that starting a session
    /// also garbage-collects the backend.
    pub gc_probability: u32,
    pub gc_divisor: u32,

    /// Directory for the file driver. `None` uses the system temp dir.
    pub save_path: Option<PathBuf>,

    /// Connection settings for the cache driver.
    pub cache: CacheParams,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            driver: Driver::default(),
            cookie_name: "PHPSESSID".to_string(),
            auto_renew: false,
            key_prefix: String::new(),
            cookie_path: "/".to_string(),
            cookie_domain: CookieDomain::default(),
            cache_limiter: CacheLimiter::default(),
            data_lifetime: 86_400,
            cookie_lifetime: 86_400,
            allow_url_transport: false,
            strict_mode: false,
            gc_probability: 1,
            gc_divisor: 100,
            save_path: None,
            cache: CacheParams::default(),
        }
    }
}

impl SessionConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a JSON document, filling omitted keys with defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Set the backend driver.
    pub fn with_driver(mut self, driver: Driver) -> Self {
        self.driver = driver;
        self
    }

    /// Set the cookie name.
    pub fn with_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }

    /// Enable or disable eager TTL renewal.
    pub fn with_auto_renew(mut self, enabled: bool) -> Self {
        self.auto_renew = enabled;
        self
    }

    /// Set the storage key prefix.
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Set the cookie path.
    pub fn with_cookie_path(mut self, path: impl Into<String>) -> Self {
        self.cookie_path = path.into();
        self
    }

    /// Set the cookie domain mode.
    pub fn with_cookie_domain(mut self, domain: CookieDomain) -> Self {
        self.cookie_domain = domain;
        self
    }

    /// Set the cache limiter.
    pub fn with_cache_limiter(mut self, limiter: CacheLimiter) -> Self {
        self.cache_limiter = limiter;
        self
    }

    /// Set data and cookie lifetimes, in seconds.
    pub fn with_lifetimes(mut self, data: u64, cookie: u64) -> Self {
        self.data_lifetime = data;
        self.cookie_lifetime = cookie;
        self
    }

    /// Allow or forbid identifiers from URL/body parameters.
    pub fn with_url_transport(mut self, allowed: bool) -> Self {
        self.allow_url_transport = allowed;
        self
    }

    /// Enable or disable strict identifier adoption.
    pub fn with_strict_mode(mut self, enabled: bool) -> Self {
        self.strict_mode = enabled;
        self
    }

    /// Set the probabilistic gc ratio. `(0, _)` disables gc at start.
    pub fn with_gc(mut self, probability: u32, divisor: u32) -> Self {
        self.gc_probability = probability;
        self.gc_divisor = divisor;
        self
    }

    /// Set the file driver's directory.
    pub fn with_save_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.save_path = Some(path.into());
        self
    }

    /// Builds the parameters handed to the backend's `open`.
    pub fn backend_params(&self) -> BackendParams {
        match self.driver {
            Driver::File => BackendParams::File {
                save_path: self.save_path.clone().unwrap_or_else(std::env::temp_dir),
            },
            Driver::Cache => BackendParams::Cache {
                host: self.cache.host.clone(),
                port: self.cache.port,
                db: self.cache.db,
                password: self.cache.password.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_config_default() {
        let config = SessionConfig::default();
        assert_eq!(config.driver, Driver::Cache);
        assert_eq!(config.cookie_name, "PHPSESSID");
        assert!(!config.auto_renew);
        assert_eq!(config.data_lifetime, 86_400);
        assert_eq!(config.cookie_lifetime, 86_400);
        assert_eq!(config.cache_limiter, CacheLimiter::NoCache);
        assert!(!config.allow_url_transport);
    }

    #[test]
    fn test_from_json_partial_merges_over_defaults() {
        let config =
            SessionConfig::from_json(r#"{"data_lifetime": 3600, "cookie_domain": "domain"}"#)
                .unwrap();
        assert_eq!(config.data_lifetime, 3600);
        assert_eq!(config.cookie_domain, CookieDomain::Domain);
        assert_eq!(config.cookie_lifetime, 86_400);
        assert_eq!(config.cookie_path, "/");
    }

    #[test]
    fn test_from_json_ignores_unknown_keys() {
        let config = SessionConfig::from_json(r#"{"no_such_option": true}"#).unwrap();
        assert_eq!(config, SessionConfig::default());
    }

    #[test]
    fn test_from_json_wrong_type_is_parse_error() {
        let err = SessionConfig::from_json(r#"{"data_lifetime": "soon"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_cookie_domain_string_forms() {
        assert_eq!(CookieDomain::from("host".to_string()), CookieDomain::Host);
        assert_eq!(CookieDomain::from("domain".to_string()), CookieDomain::Domain);
        assert_eq!(
            CookieDomain::from(".example.org".to_string()),
            CookieDomain::Literal(".example.org".into())
        );
        assert_eq!(String::from(CookieDomain::Host), "host");
    }

    #[test]
    fn test_backend_params_follow_driver() {
        let cache = SessionConfig::default().backend_params();
        assert!(matches!(cache, BackendParams::Cache { port: 6379, .. }));

        let file = SessionConfig::default()
            .with_driver(Driver::File)
            .with_save_path("/var/lib/sessions")
            .backend_params();
        assert_eq!(
            file,
            BackendParams::File {
                save_path: PathBuf::from("/var/lib/sessions")
            }
        );
    }
}

//! Client-cache headers sent alongside a started session.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A fixed date in the past, used to force `Expires` into history.
const EXPIRED_DATE: &str = "Thu, 19 Nov 1981 08:52:00 GMT";

const HTTP_DATE: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Which client-cache headers accompany session responses.
///
/// Pages that depend on session state usually must not be cached by
/// shared proxies; the default (`nocache`) forbids caching entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CacheLimiter {
    /// Forbid any caching.
    #[default]
    #[serde(rename = "nocache")]
    NoCache,
    /// Allow the client (not proxies) to cache, with an expired `Expires`.
    #[serde(rename = "private")]
    Private,
    /// Like `Private`, without the `Expires` header.
    #[serde(rename = "private_no_expire")]
    PrivateNoExpire,
    /// Allow shared caches.
    #[serde(rename = "public")]
    Public,
    /// Send no cache headers at all.
    #[serde(rename = "")]
    Off,
}

impl CacheLimiter {
    /// The response headers for this limiter.
    ///
    /// `expire_minutes` is the cache lifetime (`data_lifetime / 60`);
    /// `now` dates the `Expires` header of the `public` limiter.
    pub fn headers(self, expire_minutes: u64, now: DateTime<Utc>) -> Vec<(&'static str, String)> {
        let max_age = expire_minutes.saturating_mul(60);
        match self {
            Self::NoCache => vec![
                ("Expires", EXPIRED_DATE.to_string()),
                ("Cache-Control", "no-store, no-cache, must-revalidate".to_string()),
                ("Pragma", "no-cache".to_string()),
            ],
            Self::Private => vec![
                ("Expires", EXPIRED_DATE.to_string()),
                ("Cache-Control", format!("private, max-age={max_age}")),
            ],
            Self::PrivateNoExpire => {
                vec![("Cache-Control", format!("private, max-age={max_age}"))]
            }
            Self::Public => {
                let secs = i64::try_from(max_age).unwrap_or(i64::MAX);
                let expires = Duration::try_seconds(secs)
                    .and_then(|d| now.checked_add_signed(d))
                    .unwrap_or(DateTime::<Utc>::MAX_UTC);
                vec![
                    ("Expires", expires.format(HTTP_DATE).to_string()),
                    ("Cache-Control", format!("public, max-age={max_age}")),
                ]
            }
            Self::Off => Vec::new(),
        }
    }
}

impl fmt::Display for CacheLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCache => write!(f, "nocache"),
            Self::Private => write!(f, "private"),
            Self::PrivateNoExpire => write!(f, "private_no_expire"),
            Self::Public => write!(f, "public"),
            Self::Off => write!(f, ""),
        }
    }
}

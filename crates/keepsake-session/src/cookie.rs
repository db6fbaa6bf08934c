//! The session cookie handed to the host.

use cookie::time::{Duration, OffsetDateTime};
use cookie::SameSite;
use keepsake_codec::SessionId;
use keepsake_config::SessionOptions;

/// Attributes of the session cookie.
///
/// The host decides how to transmit it; [`to_header_value`](Self::to_header_value)
/// renders the standard `Set-Cookie` form for hosts that just need a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    /// The session identifier.
    pub value: String,
    pub path: String,
    /// Empty for a host-only cookie.
    pub domain: String,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: Option<String>,
    /// Seconds. 0 means a browser-session cookie (no `Max-Age`).
    pub max_age: u64,
}

impl Cookie {
    /// Builds the cookie for `id` from resolved options.
    pub fn for_session(options: &SessionOptions, id: &SessionId) -> Self {
        Self {
            name: options.cookie_name.clone(),
            value: id.to_string(),
            path: options.cookie_path.clone(),
            domain: options.cookie_domain.clone(),
            secure: options.cookie_secure,
            http_only: options.cookie_http_only,
            same_site: options.cookie_same_site.map(str::to_string),
            max_age: options.cookie_lifetime,
        }
    }

    /// Renders the cookie as a `Set-Cookie` header value.
    pub fn to_header_value(&self) -> String {
        let mut builder = cookie::Cookie::build((self.name.clone(), self.value.clone()))
            .path(self.path.clone())
            .secure(self.secure)
            .http_only(self.http_only);

        if !self.domain.is_empty() {
            builder = builder.domain(self.domain.clone());
        }
        if let Some(same_site) = self.same_site.as_deref().and_then(parse_same_site) {
            builder = builder.same_site(same_site);
        }
        if self.max_age > 0 {
            let lifetime = Duration::seconds(i64::try_from(self.max_age).unwrap_or(i64::MAX));
            builder = builder.max_age(lifetime);
            if let Some(expires) = OffsetDateTime::now_utc().checked_add(lifetime) {
                builder = builder.expires(expires);
            }
        }

        builder.build().to_string()
    }
}

fn parse_same_site(value: &str) -> Option<SameSite> {
    match value.to_ascii_lowercase().as_str() {
        "lax" => Some(SameSite::Lax),
        "strict" => Some(SameSite::Strict),
        "none" => Some(SameSite::None),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use keepsake_config::{RequestEnv, SessionConfig, resolve};

    use super::*;

    fn cookie_for(config: SessionConfig, secure: bool) -> Cookie {
        let opts = resolve(&config, &RequestEnv::new(Some("www.example.com"), secure)).unwrap();
        Cookie::for_session(&opts, &SessionId::parse("abc123").unwrap())
    }

    #[test]
    fn test_for_session_copies_resolved_attributes() {
        let cookie = cookie_for(SessionConfig::default(), false);
        assert_eq!(cookie.name, "phpsessid");
        assert_eq!(cookie.value, "abc123");
        assert_eq!(cookie.domain, "example.com");
        assert_eq!(cookie.path, "/");
        assert!(cookie.http_only);
        assert!(!cookie.secure);
        assert_eq!(cookie.same_site.as_deref(), Some("Lax"));
        assert_eq!(cookie.max_age, 86_400);
    }

    #[test]
    fn test_header_value_contains_security_attributes() {
        let header = cookie_for(SessionConfig::default(), true).to_header_value();
        assert!(header.starts_with("phpsessid=abc123"));
        assert!(header.contains("HttpOnly"));
        assert!(header.contains("Secure"));
        assert!(header.contains("SameSite=Lax"));
        assert!(header.contains("Domain=example.com"));
        assert!(header.contains("Path=/"));
        assert!(header.contains("Max-Age=86400"));
    }

    #[test]
    fn test_header_value_session_cookie_has_no_max_age() {
        let mut cookie = cookie_for(SessionConfig::default(), false);
        cookie.max_age = 0;
        cookie.domain.clear();

        let header = cookie.to_header_value();
        assert!(!header.contains("Max-Age"));
        assert!(!header.contains("Expires"));
        assert!(!header.contains("Domain"));
    }
}

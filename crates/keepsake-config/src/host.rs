//! Host-name normalization for the cookie `Domain` attribute.

use std::net::IpAddr;

/// Maps a request host onto the domain a session cookie should cover.
///
/// Deriving a registrable domain properly needs the public suffix list.
/// Applications that care can plug one in here; [`ParentDomain`] is a
/// small built-in approximation.
pub trait HostNormalizer {
    /// Returns the registrable domain for `host` (already port-stripped).
    fn registrable_domain(&self, host: &str) -> String;
}

/// Two-label public suffixes common enough to special-case.
const TWO_LABEL_SUFFIXES: &[&str] = &[
    "co.uk", "org.uk", "ac.uk", "gov.uk", "com.cn", "net.cn", "org.cn", "gov.cn", "com.au",
    "net.au", "org.au", "co.jp", "ne.jp", "or.jp", "com.hk", "com.tw", "co.nz", "com.br",
    "co.kr", "com.sg", "co.in", "com.mx",
];

/// Keeps the last two labels of a host name (three under a known
/// two-label suffix like `co.uk`).
///
/// IP addresses and single-label hosts (`localhost`) are returned as is.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParentDomain;

impl HostNormalizer for ParentDomain {
    fn registrable_domain(&self, host: &str) -> String {
        let host = host.trim_end_matches('.').to_ascii_lowercase();
        if host.starts_with('[') || host.parse::<IpAddr>().is_ok() {
            return host;
        }

        let labels: Vec<&str> = host.split('.').filter(|l| !l.is_empty()).collect();
        if labels.len() <= 2 {
            return labels.join(".");
        }

        let last_two = labels[labels.len() - 2..].join(".");
        let keep = if TWO_LABEL_SUFFIXES.contains(&last_two.as_str()) { 3 } else { 2 };
        labels[labels.len().saturating_sub(keep)..].join(".")
    }
}

/// Strips a trailing `:port` from a `Host` header value.
///
/// Bracketed IPv6 literals keep their brackets: `[::1]:8080` → `[::1]`.
pub fn strip_port(host: &str) -> &str {
    let host = host.trim();
    if host.starts_with('[') {
        return match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        };
    }
    host.split(':').next().unwrap_or(host)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parent(host: &str) -> String {
        ParentDomain.registrable_domain(host)
    }

    #[test]
    fn test_parent_domain_drops_subdomains() {
        assert_eq!(parent("www.example.com"), "example.com");
        assert_eq!(parent("a.b.c.example.com"), "example.com");
        assert_eq!(parent("example.com"), "example.com");
    }

    #[test]
    fn test_parent_domain_handles_two_label_suffix() {
        assert_eq!(parent("shop.example.co.uk"), "example.co.uk");
        assert_eq!(parent("www.abc.com.cn"), "abc.com.cn");
    }

    #[test]
    fn test_parent_domain_leaves_ips_and_single_labels() {
        assert_eq!(parent("127.0.0.1"), "127.0.0.1");
        assert_eq!(parent("localhost"), "localhost");
        assert_eq!(parent("[::1]"), "[::1]");
    }

    #[test]
    fn test_parent_domain_normalizes_case_and_trailing_dot() {
        assert_eq!(parent("WWW.Example.COM."), "example.com");
    }

    #[test]
    fn test_strip_port() {
        assert_eq!(strip_port("www.example.com:8080"), "www.example.com");
        assert_eq!(strip_port("www.example.com"), "www.example.com");
        assert_eq!(strip_port("[::1]:443"), "[::1]");
        assert_eq!(strip_port(""), "");
    }
}

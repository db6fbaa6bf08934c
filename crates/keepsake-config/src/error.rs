//! Error types for option resolution.

/// Errors that can occur while resolving session options.
///
/// Every variant is a structural problem with the supplied options.
/// Contradictory-but-fixable values (a cookie that would expire before
/// its data) are clamped instead, see [`resolve`](crate::resolve).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The cookie name is empty or not ASCII alphanumeric.
    #[error("invalid cookie name {0:?}: must be non-empty and alphanumeric")]
    InvalidCookieName(String),

    /// The cookie path doesn't start with `/`.
    #[error("invalid cookie path {0:?}: must start with '/'")]
    InvalidPath(String),

    /// The data lifetime is zero.
    #[error("data lifetime must be at least one second")]
    InvalidLifetime,

    /// `gc_divisor` is zero or smaller than `gc_probability`.
    #[error("invalid gc ratio {probability}/{divisor}")]
    InvalidGcRatio { probability: u32, divisor: u32 },

    /// The URL identifier pattern couldn't be compiled.
    #[error("invalid url id pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// A JSON configuration document couldn't be parsed.
    #[error("failed to parse session config: {0}")]
    Parse(#[from] serde_json::Error),
}

//! Error types for the codec layer.

/// Errors that can occur while encoding or decoding a working set.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Serialization failed (turning a working set into bytes).
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// Deserialization failed (turning stored bytes back into a working set).
    ///
    /// Common causes: a blob written by an older release, a truncated
    /// write, or a foreign process sharing the same key prefix.
    #[error("decode failed: {0}")]
    Decode(#[source] serde_json::Error),

    /// The blob decoded, but it isn't a key/value mapping.
    #[error("stored session is not a mapping: found {0}")]
    NotAMapping(&'static str),

    /// A session identifier failed validation.
    #[error("invalid session id: {0:?}")]
    InvalidId(String),
}

//! Unified error type for Keepsake.

use keepsake_codec::CodecError;
use keepsake_config::ConfigError;
use keepsake_session::SessionError;
use keepsake_store::StoreError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `keepsake` meta-crate you deal with this single error
/// type instead of importing errors from each sub-crate; `?` converts
/// sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum KeepsakeError {
    /// A storage error (open, read, write, gc).
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A codec error (encode, decode, invalid identifier).
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Invalid or unparsable options.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Session start failed.
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl KeepsakeError {
    /// Returns `true` if the request can't continue with session state.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Session(e) if e.is_fatal())
    }
}

#[cfg(test)]
mod tests {
    use keepsake_session::InitError;

    use super::*;

    #[test]
    fn test_from_store_error() {
        let err = StoreError::Unavailable("cache down".into());
        let keepsake_err: KeepsakeError = err.into();
        assert!(matches!(keepsake_err, KeepsakeError::Store(_)));
        assert!(keepsake_err.to_string().contains("cache down"));
    }

    #[test]
    fn test_from_codec_error() {
        let err = CodecError::InvalidId("../x".into());
        let keepsake_err: KeepsakeError = err.into();
        assert!(matches!(keepsake_err, KeepsakeError::Codec(_)));
    }

    #[test]
    fn test_from_config_error() {
        let err = ConfigError::InvalidCookieName("my-session".into());
        let keepsake_err: KeepsakeError = err.into();
        assert!(matches!(keepsake_err, KeepsakeError::Config(_)));
        assert!(!keepsake_err.is_fatal());
    }

    #[test]
    fn test_from_session_error_keeps_fatality() {
        let err = SessionError::from(InitError::AlreadyActive);
        let keepsake_err: KeepsakeError = err.into();
        assert!(matches!(keepsake_err, KeepsakeError::Session(_)));
        assert!(keepsake_err.is_fatal());
    }
}

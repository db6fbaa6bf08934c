//! Error types for the session layer.

use keepsake_config::ConfigError;
use keepsake_store::StoreError;

/// Errors that can occur while starting a session.
///
/// Only start can fail. Once a [`Session`](crate::Session) exists, backend
/// failures are reported as `false` from the operation that hit them.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The options couldn't be resolved.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The session couldn't be started. The request can't continue with
    /// session state and should be aborted.
    #[error("session start failed: {0}")]
    FatalInit(#[from] InitError),
}

/// Why [`Session::start`](crate::Session::start) gave up.
#[derive(Debug, thiserror::Error)]
pub enum InitError {
    /// Response headers are already out; the session cookie can't be sent.
    #[error("response headers already sent")]
    HeadersSent,

    /// The host refused to register the session, usually because another
    /// session is already active for this request.
    #[error("host rejected session registration (session already active?)")]
    AlreadyActive,

    /// The backend failed to open.
    #[error("backend open failed: {0}")]
    BackendOpen(#[source] StoreError),

    /// The backend failed to read the stored working set.
    #[error("backend read failed: {0}")]
    BackendRead(#[source] StoreError),
}

impl SessionError {
    /// Returns `true` for failures the request can't recover from.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::FatalInit(_))
    }
}

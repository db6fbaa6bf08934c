/// Errors that can occur in the storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// An operation ran before [`open`](crate::StorageBackend::open).
    #[error("backend not open")]
    NotOpen,

    /// The backend couldn't be reached or refused the connection.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// The backend rejected the request (bad parameters, read-only, ...).
    #[error("backend rejected request: {0}")]
    Rejected(String),

    /// Filesystem-level failure.
    #[error("backend i/o failed: {0}")]
    Io(#[source] std::io::Error),
}

//! Session lifecycle state.

use std::fmt;

/// Where a [`Session`](crate::Session) is in its request lifetime.
///
/// ```text
///   Active ──(reset)────→ Aborted ──┐
///     │                              │
///     ├──(destroy/empty)─→ Destroyed ┼──(close/drop)──→ Closed
///     │                              │
///     └──────────(close/drop: flush)─┘
/// ```
///
/// - **Active**: loaded, accepting reads and writes; flushed on close.
/// - **Aborted**: in-memory changes were discarded; close writes nothing.
/// - **Destroyed**: the stored entry is gone; close writes nothing.
/// - **Closed**: the request is over. Terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Active,
    Aborted,
    Destroyed,
    Closed,
}

impl SessionState {
    /// Returns `true` if closing the session will write it back.
    pub fn flushes_on_close(self) -> bool {
        matches!(self, Self::Active)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Aborted => write!(f, "aborted"),
            Self::Destroyed => write!(f, "destroyed"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

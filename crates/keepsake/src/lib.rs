//! # Keepsake
//!
//! Server-side session state for request/response applications.
//!
//! Keepsake gives each client a stable identifier carried in a cookie,
//! keeps a key/value working set for that identifier across requests,
//! expires it after a configurable lifetime, and hands application code
//! typed accessors over the data. HTTP itself stays with the host: the
//! application implements [`HostContext`](keepsake_session::HostContext)
//! for its framework and injects a [`StorageBackend`](keepsake_store::StorageBackend).
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use keepsake::prelude::*;
//!
//! let pool = MemoryPool::new();
//! let builder = SessionBuilder::new().config(SessionConfig::default().with_auto_renew(true));
//!
//! // Per request:
//! let mut session = builder.start_memory(&pool, my_host)?;
//! let visits = session.get_or("visits", 0) + 1;
//! session.set("visits", visits);
//! session.close();
//! ```

mod builder;
mod error;
pub mod telemetry;

pub use builder::SessionBuilder;
pub use error::KeepsakeError;

pub use keepsake_codec as codec;
pub use keepsake_config as config;
pub use keepsake_gc as gc;
pub use keepsake_session as session;
pub use keepsake_store as store;

pub mod prelude {
    pub use crate::{KeepsakeError, SessionBuilder};
    pub use keepsake_codec::{SessionId, Value};
    pub use keepsake_config::{CacheLimiter, CookieDomain, Driver, SessionConfig, SessionOptions};
    pub use keepsake_gc::{GcConfig, GcSweeper};
    pub use keepsake_session::{Cookie, HostContext, Session, SessionState};
    pub use keepsake_store::{MemoryBackend, MemoryPool, RenewPolicy, StorageBackend};
}

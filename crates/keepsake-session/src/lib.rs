//! Session lifecycle management for Keepsake.
//!
//! This crate is the part applications talk to:
//!
//! 1. **Start** — [`Session::start`] picks an identifier, loads the stored
//!    working set and sends the cookie through the [`HostContext`]
//! 2. **Use** — typed accessors (`get`, `get_or`, `set`, `del`, `data`)
//!    read and write the in-memory working set
//! 3. **End** — [`Session::close`] (or drop) writes the working set back
//!
//! # How it fits in the stack
//!
//! ```text
//! Application (above)  ← one Session per request
//!     ↕
//! Session Layer (this crate)  ← identifier lifecycle + typed access
//!     ↕
//! Config (keepsake-config)  ← resolved SessionOptions
//! Store (keepsake-store)    ← StorageBackend trait
//! Codec (keepsake-codec)    ← working set ↔ bytes
//! ```

mod access;
mod cookie;
mod error;
mod host;
mod manager;
mod session;

pub use access::FromSessionValue;
pub use self::cookie::Cookie;
pub use error::{InitError, SessionError};
pub use host::HostContext;
pub use manager::Session;
pub use session::SessionState;

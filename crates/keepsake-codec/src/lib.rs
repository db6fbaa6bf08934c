//! Working-set serialization for Keepsake.
//!
//! This crate defines what a session looks like once it leaves memory:
//!
//! - **Types** ([`SessionId`], [`WorkingSet`], [`Timestamped`]) — the
//!   identifier a client carries and the key/value data stored under it.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how a working set is
//!   turned into the single blob a storage backend persists.
//! - **Errors** ([`CodecError`]) — what can go wrong during
//!   encoding/decoding.
//!
//! # Architecture
//!
//! The codec layer sits between storage (raw bytes keyed by identifier)
//! and the session manager (typed values). It knows nothing about cookies
//! or backends.
//!
//! ```text
//! Store (bytes) → Codec (WorkingSet) → Session (typed accessors)
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
pub use codec::JsonCodec;
pub use error::CodecError;
pub use types::{SessionId, Timestamped, WorkingSet};

// Values inside a working set are plain JSON values. Re-exported so
// downstream crates don't need their own `serde_json` dependency just
// to name them.
pub use serde_json::{Map, Value};

//! Core types stored by Keepsake.
//!
//! Everything here is what ends up inside a backend entry or a cookie:
//! the identifier a client carries, the working set kept under it, and
//! the timestamped-value convention used for auditable writes.

use std::fmt;

use rand::Rng;
use rand::distr::Alphanumeric;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::CodecError;

/// The in-memory key/value data of one session during one request.
///
/// A plain JSON object: keys are strings, values are arbitrary JSON.
/// A key holding [`Value::Null`] is the "deleted" marker. It survives a
/// flush but reads back the same as a missing key.
pub type WorkingSet = Map<String, Value>;

// ---------------------------------------------------------------------------
// SessionId
// ---------------------------------------------------------------------------

/// An opaque token identifying one client's server-side state.
///
/// Newtype over `String` so an identifier can't be confused with a key
/// or a cookie name in a function signature. Serializes as the bare
/// string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Length of a freshly generated identifier.
    pub const GENERATED_LEN: usize = 32;

    /// Longest identifier accepted from a client.
    pub const MAX_LEN: usize = 128;

    /// Generates a new random identifier: 32 alphanumeric characters
    /// (about 190 bits of entropy) drawn from the thread-local CSPRNG.
    pub fn generate() -> Self {
        let token: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(Self::GENERATED_LEN)
            .map(char::from)
            .collect();
        Self(token)
    }

    /// Validates an identifier supplied by a client.
    ///
    /// Accepts 1–128 characters from `[A-Za-z0-9,_-]`. Anything else
    /// (empty, too long, or containing characters that could break out
    /// of a storage key) is rejected.
    ///
    /// # Errors
    /// Returns [`CodecError::InvalidId`] when validation fails.
    pub fn parse(raw: &str) -> Result<Self, CodecError> {
        let valid = !raw.is_empty()
            && raw.len() <= Self::MAX_LEN
            && raw
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || matches!(b, b',' | b'_' | b'-'));
        if valid {
            Ok(Self(raw.to_string()))
        } else {
            Err(CodecError::InvalidId(raw.to_string()))
        }
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the identifier, returning the underlying string.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// Timestamped
// ---------------------------------------------------------------------------

/// A value wrapped with the unix time it was last written.
///
/// This is a convention, not a distinct stored type: in the working set
/// it is just an object `{ "val": ..., "time": ... }`. Use
/// [`Timestamped::from_value`] to recognise one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timestamped {
    /// The wrapped value.
    pub val: Value,
    /// Unix seconds of the last write.
    pub time: i64,
}

impl Timestamped {
    /// Wraps `val` with the given timestamp.
    pub fn new(val: Value, time: i64) -> Self {
        Self { val, time }
    }

    /// Reads a stored value back as a wrapper.
    ///
    /// Returns `None` for anything that isn't an object. An object without
    /// a `val` field reads as a null value; a missing or non-integer
    /// `time` reads as 0.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        Some(Self {
            val: obj.get("val").cloned().unwrap_or(Value::Null),
            time: obj.get("time").and_then(Value::as_i64).unwrap_or(0),
        })
    }

    /// Converts the wrapper into the object stored in the working set.
    pub fn into_value(self) -> Value {
        let mut obj = Map::with_capacity(2);
        obj.insert("val".into(), self.val);
        obj.insert("time".into(), Value::from(self.time));
        Value::Object(obj)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_generate_is_alphanumeric_and_fixed_length() {
        let id = SessionId::generate();
        assert_eq!(id.as_str().len(), SessionId::GENERATED_LEN);
        assert!(id.as_str().bytes().all(|b| b.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_session_id_generate_is_unique() {
        assert_ne!(SessionId::generate(), SessionId::generate());
    }

    #[test]
    fn test_session_id_parse_accepts_comma_and_dash() {
        let id = SessionId::parse("abc,DEF_12-3").unwrap();
        assert_eq!(id.to_string(), "abc,DEF_12-3");
    }

    #[test]
    fn test_session_id_parse_rejects_bad_input() {
        assert!(SessionId::parse("").is_err());
        assert!(SessionId::parse("../etc/passwd").is_err());
        assert!(SessionId::parse("has space").is_err());
        assert!(SessionId::parse(&"a".repeat(129)).is_err());
    }

    #[test]
    fn test_session_id_serializes_as_plain_string() {
        let id = SessionId::parse("xyz").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"xyz\"");
    }

    #[test]
    fn test_timestamped_into_value_shape() {
        let v = Timestamped::new(Value::from(7), 1_700_000_000).into_value();
        assert_eq!(v, serde_json::json!({"val": 7, "time": 1_700_000_000}));
    }

    #[test]
    fn test_timestamped_from_value_non_object_is_none() {
        assert!(Timestamped::from_value(&Value::from(7)).is_none());
        assert!(Timestamped::from_value(&Value::Null).is_none());
    }

    #[test]
    fn test_timestamped_from_value_missing_val_reads_null() {
        let t = Timestamped::from_value(&serde_json::json!({"other": 1})).unwrap();
        assert!(t.val.is_null());
        assert_eq!(t.time, 0);
    }
}

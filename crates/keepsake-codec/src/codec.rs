//! Codec trait and implementations for serializing/deserializing working sets.
//!
//! A storage backend only ever sees one opaque blob per session. The
//! [`Codec`] decides what that blob looks like. We ship [`JsonCodec`]
//! (human-readable, easy to inspect with `redis-cli` or `cat`); other
//! formats can be added without touching the session manager.

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::{CodecError, WorkingSet};

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// ## Trait bounds
///
/// - `Send + Sync + 'static` → a codec is a stateless strategy object
///   that may be shared by every session in the process.
///
/// The generic `encode`/`decode` pair is what implementors provide.
/// [`encode_set`](Codec::encode_set) and
/// [`decode_set`](Codec::decode_set) build on them and add the rules the
/// session manager relies on: an empty blob is an empty working set, and
/// anything that isn't a mapping is rejected.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `CodecError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, CodecError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `CodecError::Decode` if the bytes are malformed or don't
    /// match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, CodecError>;

    /// Encodes a whole working set into the blob handed to the backend.
    fn encode_set(&self, set: &WorkingSet) -> Result<Vec<u8>, CodecError> {
        self.encode(set)
    }

    /// Decodes a blob read from the backend into a working set.
    ///
    /// Backends return an empty blob for unknown or expired sessions, so
    /// empty (or whitespace-only) input yields an empty set.
    fn decode_set(&self, data: &[u8]) -> Result<WorkingSet, CodecError> {
        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(WorkingSet::new());
        }
        match self.decode::<Value>(data)? {
            Value::Object(map) => Ok(map),
            other => Err(CodecError::NotAMapping(kind_of(&other))),
        }
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// ## Example
///
/// ```rust
/// use keepsake_codec::{Codec, JsonCodec, Value, WorkingSet};
///
/// let mut set = WorkingSet::new();
/// set.insert("user".into(), Value::from("ada"));
///
/// let blob = JsonCodec.encode_set(&set).unwrap();
/// let back = JsonCodec.decode_set(&blob).unwrap();
/// assert_eq!(back["user"], "ada");
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(value).map_err(CodecError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, CodecError> {
        serde_json::from_slice(data).map_err(CodecError::Decode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_set_empty_blob_returns_empty_set() {
        let set = JsonCodec.decode_set(b"").unwrap();
        assert!(set.is_empty());

        let set = JsonCodec.decode_set(b"  \n").unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn test_decode_set_rejects_non_mapping() {
        let err = JsonCodec.decode_set(b"[1,2,3]").unwrap_err();
        assert!(matches!(err, CodecError::NotAMapping("array")));
    }

    #[test]
    fn test_decode_set_malformed_returns_decode_error() {
        let err = JsonCodec.decode_set(b"{\"a\":").unwrap_err();
        assert!(matches!(err, CodecError::Decode(_)));
        assert!(err.to_string().starts_with("decode failed"));
    }

    #[test]
    fn test_encode_set_preserves_nested_values() {
        let mut set = WorkingSet::new();
        set.insert("cart".into(), serde_json::json!({"items": [1, 2], "total": 9.5}));
        set.insert("gone".into(), Value::Null);

        let blob = JsonCodec.encode_set(&set).unwrap();
        let back = JsonCodec.decode_set(&blob).unwrap();

        assert_eq!(back, set);
        assert!(back["gone"].is_null(), "null markers survive a flush");
    }
}

//! Typed access to the working set.
//!
//! Everything here works on the in-memory working set only; nothing
//! touches the backend until the session is closed.
//!
//! Deleting a key stores a null marker instead of removing the entry, so
//! a deletion survives a flush that merges over older data. Reads treat
//! a null marker exactly like a missing key.

use keepsake_codec::{Codec, Map, Timestamped, Value};
use keepsake_store::StorageBackend;

use crate::{HostContext, Session};

// ---------------------------------------------------------------------------
// FromSessionValue
// ---------------------------------------------------------------------------

/// Conversion from a stored value into a concrete type.
///
/// Used by [`Session::get_or`]: the default's type picks the conversion.
/// Conversions are lenient in the way form data usually needs them to be
/// (`"42"` reads as `42`, `"0"` as `false`). Returning `None` makes the
/// caller fall back to its default.
pub trait FromSessionValue: Sized {
    fn from_session_value(value: &Value) -> Option<Self>;
}

impl FromSessionValue for Value {
    fn from_session_value(value: &Value) -> Option<Self> {
        Some(value.clone())
    }
}

impl FromSessionValue for String {
    fn from_session_value(value: &Value) -> Option<Self> {
        Some(match value {
            Value::Null => String::new(),
            Value::Bool(true) => "1".to_string(),
            Value::Bool(false) => String::new(),
            Value::Number(n) => match n.as_f64() {
                Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e15 => {
                    format!("{}", f as i64)
                }
                _ => n.to_string(),
            },
            Value::String(s) => s.clone(),
            Value::Array(_) | Value::Object(_) => value.to_string(),
        })
    }
}

impl FromSessionValue for bool {
    fn from_session_value(value: &Value) -> Option<Self> {
        Some(match value {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
            Value::String(s) => !(s.is_empty() || s == "0"),
            Value::Array(a) => !a.is_empty(),
            Value::Object(o) => !o.is_empty(),
        })
    }
}

impl FromSessionValue for f64 {
    fn from_session_value(value: &Value) -> Option<Self> {
        Some(match value {
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(n) => n.as_f64().unwrap_or(0.0),
            Value::String(s) => numeric_prefix(s).parse().unwrap_or(0.0),
            Value::Array(a) => f64::from(u8::from(!a.is_empty())),
            Value::Object(o) => f64::from(u8::from(!o.is_empty())),
        })
    }
}

impl FromSessionValue for i64 {
    fn from_session_value(value: &Value) -> Option<Self> {
        Some(match value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_u64().map(|u| i64::try_from(u).unwrap_or(i64::MAX)))
                .unwrap_or_else(|| n.as_f64().map_or(0, |f| f as i64)),
            Value::String(s) => {
                let prefix = numeric_prefix(s);
                prefix
                    .parse::<i64>()
                    .unwrap_or_else(|_| prefix.parse::<f64>().map_or(0, |f| f as i64))
            }
            // The remaining kinds collapse to 0/1 the same way floats do.
            other => f64::from_session_value(other).map_or(0, |f| f as i64),
        })
    }
}

macro_rules! saturating_int {
    ($($t:ty),*) => {$(
        impl FromSessionValue for $t {
            fn from_session_value(value: &Value) -> Option<Self> {
                let wide = i64::from_session_value(value)?;
                Some(<$t>::try_from(wide).unwrap_or(if wide < 0 { <$t>::MIN } else { <$t>::MAX }))
            }
        }
    )*};
}

saturating_int!(i32, u32, u64, usize);

impl FromSessionValue for Vec<Value> {
    fn from_session_value(value: &Value) -> Option<Self> {
        match value {
            Value::Array(a) => Some(a.clone()),
            Value::String(s) => match serde_json::from_str(s) {
                Ok(Value::Array(a)) => Some(a),
                _ => None,
            },
            _ => None,
        }
    }
}

impl FromSessionValue for Map<String, Value> {
    fn from_session_value(value: &Value) -> Option<Self> {
        match value {
            Value::Object(o) => Some(o.clone()),
            Value::String(s) => match serde_json::from_str(s) {
                Ok(Value::Object(o)) => Some(o),
                _ => None,
            },
            _ => None,
        }
    }
}

/// The longest prefix of `s` (after leading whitespace) that reads as a
/// decimal number: sign, digits, fraction, exponent.
fn numeric_prefix(s: &str) -> &str {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let digits = |mut i: usize| {
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        i
    };

    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end = 1;
    }
    let int_end = digits(end);
    let mut mantissa_end = int_end;
    if bytes.get(int_end) == Some(&b'.') {
        let frac_end = digits(int_end + 1);
        if frac_end > int_end + 1 || int_end > end {
            mantissa_end = frac_end;
        }
    }
    if mantissa_end == end {
        return "";
    }

    let mut total = mantissa_end;
    if matches!(bytes.get(mantissa_end), Some(b'e' | b'E')) {
        let mut exp = mantissa_end + 1;
        if matches!(bytes.get(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        let exp_end = digits(exp);
        if exp_end > exp {
            total = exp_end;
        }
    }
    &s[..total]
}

// ---------------------------------------------------------------------------
// Accessors
// ---------------------------------------------------------------------------

impl<B: StorageBackend, H: HostContext, C: Codec> Session<B, H, C> {
    /// Stores `value` under `key`.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Stores every pair from `entries`.
    pub fn set_many<K, V, I>(&mut self, entries: I) -> &mut Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        for (key, value) in entries {
            self.data.insert(key.into(), value.into());
        }
        self
    }

    /// Returns the value under `key`, or `None` if it is missing or deleted.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key).filter(|v| !v.is_null())
    }

    /// Returns the value under `key` converted to the type of `default`,
    /// or `default` when the key is missing, deleted, or can't be
    /// converted.
    ///
    /// ```ignore
    /// session.set("n", "42");
    /// assert_eq!(session.get_or("n", 0), 42);
    /// assert_eq!(session.get_or("n", String::new()), "42");
    /// ```
    pub fn get_or<T: FromSessionValue>(&self, key: &str, default: T) -> T {
        self.get(key)
            .and_then(T::from_session_value)
            .unwrap_or(default)
    }

    /// Marks each key as deleted.
    pub fn del<I, K>(&mut self, keys: I) -> &mut Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        for key in keys {
            self.data.insert(key.into(), Value::Null);
        }
        self
    }

    /// Returns `true` if `key` holds a non-null value.
    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Number of keys holding a non-null value.
    pub fn len(&self) -> usize {
        self.data.values().filter(|v| !v.is_null()).count()
    }

    /// Returns `true` if no key holds a non-null value.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys holding a non-null value.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.data
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, _)| k.as_str())
    }

    // -- Timestamped values -----------------------------------------------

    /// Reads the `val` field of the timestamped value under `key`.
    ///
    /// Returns `None` if the key is missing, or the stored value is not an
    /// object, or its `val` is null.
    pub fn data(&self, key: &str) -> Option<Value> {
        self.get(key)
            .and_then(Timestamped::from_value)
            .map(|t| t.val)
            .filter(|v| !v.is_null())
    }

    /// The unix time the timestamped value under `key` was written.
    ///
    /// `None` unless the stored object carries an integer `time`.
    pub fn data_time(&self, key: &str) -> Option<i64> {
        self.get(key)?.get("time")?.as_i64()
    }

    /// Writes a timestamped value.
    ///
    /// - `false` (or null) clears the key.
    /// - Arrays and objects are stored as given.
    /// - Anything else is stored as `{"val": value, "time": now}`.
    ///
    /// Always returns `true`.
    pub fn put_data(&mut self, key: impl Into<String>, value: impl Into<Value>) -> bool {
        let key = key.into();
        let value = value.into();
        let stored = match value {
            Value::Null | Value::Bool(false) => Value::Null,
            Value::Array(_) | Value::Object(_) => value,
            scalar => Timestamped::new(scalar, chrono::Utc::now().timestamp()).into_value(),
        };
        self.data.insert(key, stored);
        true
    }

    /// Clears a timestamped value. Same as `put_data(key, false)`.
    pub fn clear_data(&mut self, key: impl Into<String>) -> bool {
        self.put_data(key, false)
    }
}

use super::error::BencodeError;
use bytes::Bytes;
use std::collections::BTreeMap;

/// A decoded bencode value.
///
/// Everything that arrives from the network is decoded into this closed set
/// of shapes. The `as_*` accessors return `None` on a shape mismatch, while
/// the `expect_*` and [`Value::field`] accessors return a typed
/// [`BencodeError`] so callers can propagate with `?`.
///
/// # Examples
///
/// ```
/// use dhtseek::bencode::{decode, Value};
///
/// let msg = decode(b"d1:ad2:id2:ABe1:y1:qe").unwrap();
/// let args = msg.field(b"a").unwrap();
/// assert_eq!(args.field(b"id").unwrap().expect_bytes().unwrap().as_ref(), b"AB");
/// assert!(msg.field(b"r").is_err());
/// assert!(msg.field(b"y").unwrap().expect_integer().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// A signed 64-bit integer.
    Integer(i64),
    /// A byte string (not required to be UTF-8).
    Bytes(Bytes),
    /// An ordered list of values.
    List(Vec<Value>),
    /// A dictionary with byte string keys, kept in key order.
    Dict(BTreeMap<Bytes, Value>),
}

impl Value {
    /// Creates a byte string value from a UTF-8 string.
    pub fn string(s: &str) -> Self {
        Value::Bytes(Bytes::copy_from_slice(s.as_bytes()))
    }

    /// Creates a byte string value by copying a slice.
    pub fn bytes(b: &[u8]) -> Self {
        Value::Bytes(Bytes::copy_from_slice(b))
    }

    /// Builds a dictionary from static keys.
    ///
    /// ```
    /// use dhtseek::bencode::{encode, Value};
    ///
    /// let v = Value::dict([(&b"y"[..], Value::string("r")), (&b"t"[..], Value::string("aa"))]);
    /// assert_eq!(encode(&v).unwrap(), b"d1:t2:aa1:y1:re");
    /// ```
    pub fn dict<'a>(entries: impl IntoIterator<Item = (&'a [u8], Value)>) -> Self {
        Value::Dict(
            entries
                .into_iter()
                .map(|(k, v)| (Bytes::copy_from_slice(k), v))
                .collect(),
        )
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Returns the value as a UTF-8 string, if it is a valid UTF-8 byte string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Bytes(b) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&Vec<Value>> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&BTreeMap<Bytes, Value>> {
        match self {
            Value::Dict(d) => Some(d),
            _ => None,
        }
    }

    /// Consumes the value and returns the dictionary, if it is one.
    pub fn into_dict(self) -> Option<BTreeMap<Bytes, Value>> {
        match self {
            Value::Dict(d) => Some(d),
            _ => None,
        }
    }

    /// Looks up a key in this value if it is a dictionary.
    ///
    /// Returns `None` if the value is not a dictionary or if the key is not present.
    pub fn get(&self, key: &[u8]) -> Option<&Value> {
        self.as_dict()?.get(key)
    }

    pub fn expect_integer(&self) -> Result<i64, BencodeError> {
        self.as_integer()
            .ok_or(BencodeError::TypeMismatch { expected: "integer" })
    }

    pub fn expect_bytes(&self) -> Result<&Bytes, BencodeError> {
        self.as_bytes()
            .ok_or(BencodeError::TypeMismatch { expected: "byte string" })
    }

    pub fn expect_list(&self) -> Result<&Vec<Value>, BencodeError> {
        self.as_list()
            .ok_or(BencodeError::TypeMismatch { expected: "list" })
    }

    pub fn expect_dict(&self) -> Result<&BTreeMap<Bytes, Value>, BencodeError> {
        self.as_dict()
            .ok_or(BencodeError::TypeMismatch { expected: "dictionary" })
    }

    /// Looks up a required dictionary key.
    ///
    /// Fails with [`BencodeError::TypeMismatch`] if this is not a dictionary
    /// and [`BencodeError::MissingKey`] if the key is absent.
    pub fn field(&self, key: &[u8]) -> Result<&Value, BencodeError> {
        self.expect_dict()?
            .get(key)
            .ok_or_else(|| BencodeError::MissingKey(String::from_utf8_lossy(key).into_owned()))
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<Bytes> for Value {
    fn from(b: Bytes) -> Self {
        Value::Bytes(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(l: Vec<Value>) -> Self {
        Value::List(l)
    }
}

impl From<BTreeMap<Bytes, Value>> for Value {
    fn from(d: BTreeMap<Bytes, Value>) -> Self {
        Value::Dict(d)
    }
}

use super::error::BencodeError;
use super::value::Value;
use std::io::Write;

/// Encodes a bencode value to a byte vector.
///
/// Dictionaries are keyed by a `BTreeMap`, so keys always come out in
/// lexicographic byte order and the encoding of a value is reproducible.
///
/// # Examples
///
/// ```
/// use dhtseek::bencode::{encode, Value};
/// use std::collections::BTreeMap;
/// use bytes::Bytes;
///
/// let mut args = BTreeMap::new();
/// args.insert(Bytes::from_static(b"target"), Value::string("t"));
/// args.insert(Bytes::from_static(b"id"), Value::string("i"));
/// let encoded = encode(&Value::Dict(args)).unwrap();
/// assert_eq!(encoded, b"d2:id1:i6:target1:te");
/// ```
pub fn encode(value: &Value) -> Result<Vec<u8>, BencodeError> {
    let mut buf = Vec::new();
    encode_into(value, &mut buf)?;
    Ok(buf)
}

/// Appends the encoding of `value` to `buf`.
///
/// Used for wire messages that start with a fixed binary prefix followed by
/// a bencoded body.
pub fn encode_into(value: &Value, buf: &mut Vec<u8>) -> Result<(), BencodeError> {
    encode_value(value, buf)
}

fn encode_value<W: Write>(value: &Value, writer: &mut W) -> Result<(), BencodeError> {
    match value {
        Value::Integer(i) => {
            write!(writer, "i{}e", i)?;
        }
        Value::Bytes(b) => {
            write!(writer, "{}:", b.len())?;
            writer.write_all(b)?;
        }
        Value::List(l) => {
            writer.write_all(b"l")?;
            for item in l {
                encode_value(item, writer)?;
            }
            writer.write_all(b"e")?;
        }
        Value::Dict(d) => {
            writer.write_all(b"d")?;
            for (key, val) in d {
                write!(writer, "{}:", key.len())?;
                writer.write_all(key)?;
                encode_value(val, writer)?;
            }
            writer.write_all(b"e")?;
        }
    }
    Ok(())
}

//! Bencode encoding and decoding ([BEP-3]).
//!
//! Bencode is the serialization format of every KRPC datagram and of torrent
//! metadata. Input from the network is untrusted: decoding never panics and
//! reports every malformation as a [`BencodeError`].
//!
//! | Type | Format | Example |
//! |------|--------|---------|
//! | Integer | `i<number>e` | `i42e` → 42 |
//! | Byte String | `<length>:<data>` | `4:spam` → "spam" |
//! | List | `l<items>e` | `l4:spami42ee` → ["spam", 42] |
//! | Dictionary | `d<key><value>...e` | `d3:foo3:bare` → {"foo": "bar"} |
//!
//! # Examples
//!
//! ```
//! use dhtseek::bencode::{decode, encode, Value};
//!
//! let value = decode(b"d1:t2:aa1:y1:qe").unwrap();
//! assert_eq!(value.get(b"y").and_then(Value::as_str), Some("q"));
//! assert_eq!(encode(&value).unwrap(), b"d1:t2:aa1:y1:qe");
//!
//! assert!(decode(b"d1:t2:aa").is_err());
//! assert!(decode(b"").is_err());
//! ```
//!
//! [BEP-3]: http://bittorrent.org/beps/bep_0003.html

mod decode;
mod encode;
mod error;
mod value;

pub use decode::{decode, decode_prefix};
pub use encode::{encode, encode_into};
pub use error::BencodeError;
pub use value::Value;

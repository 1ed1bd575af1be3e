//! Metadata exchange extension (ut_metadata, BEP-9).
//!
//! Metadata travels in 16 KiB pieces. Each message is a bencoded dictionary;
//! data messages carry the raw piece bytes directly after it.

use std::collections::BTreeMap;

use bytes::Bytes;

use super::error::PeerError;
use crate::bencode::{decode_prefix, encode_into, Value};
use crate::constants::METADATA_PIECE_SIZE;

/// Message types for the ut_metadata extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataMessageType {
    Request = 0,
    Data = 1,
    Reject = 2,
}

impl MetadataMessageType {
    pub fn from_integer(value: i64) -> Option<Self> {
        match value {
            0 => Some(MetadataMessageType::Request),
            1 => Some(MetadataMessageType::Data),
            2 => Some(MetadataMessageType::Reject),
            _ => None,
        }
    }
}

/// A ut_metadata message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataMessage {
    pub msg_type: MetadataMessageType,
    pub piece: u32,
    /// Total metadata size, sent with data messages.
    pub total_size: Option<i64>,
    /// Piece bytes, present only in data messages.
    pub data: Option<Bytes>,
}

impl MetadataMessage {
    pub fn request(piece: u32) -> Self {
        Self {
            msg_type: MetadataMessageType::Request,
            piece,
            total_size: None,
            data: None,
        }
    }

    pub fn data(piece: u32, total_size: i64, data: Bytes) -> Self {
        Self {
            msg_type: MetadataMessageType::Data,
            piece,
            total_size: Some(total_size),
            data: Some(data),
        }
    }

    pub fn reject(piece: u32) -> Self {
        Self {
            msg_type: MetadataMessageType::Reject,
            piece,
            total_size: None,
            data: None,
        }
    }

    pub fn encode(&self) -> Result<Bytes, PeerError> {
        let mut dict = BTreeMap::new();
        dict.insert(
            Bytes::from_static(b"msg_type"),
            Value::Integer(self.msg_type as i64),
        );
        dict.insert(Bytes::from_static(b"piece"), Value::Integer(i64::from(self.piece)));
        if let Some(total_size) = self.total_size {
            dict.insert(Bytes::from_static(b"total_size"), Value::Integer(total_size));
        }

        let mut buf = Vec::new();
        encode_into(&Value::Dict(dict), &mut buf)?;
        if let Some(ref data) = self.data {
            buf.extend_from_slice(data);
        }
        Ok(Bytes::from(buf))
    }

    /// Decodes a message; anything after the dictionary of a data message
    /// is the piece payload.
    pub fn decode(payload: &Bytes) -> Result<Self, PeerError> {
        let (value, consumed) = decode_prefix(payload)?;

        let msg_type = value.field(b"msg_type")?.expect_integer()?;
        let msg_type = MetadataMessageType::from_integer(msg_type)
            .ok_or_else(|| PeerError::Extension(format!("invalid msg_type {}", msg_type)))?;

        let piece = value.field(b"piece")?.expect_integer()?;
        let piece = u32::try_from(piece)
            .map_err(|_| PeerError::Extension(format!("invalid piece {}", piece)))?;

        let total_size = value.get(b"total_size").and_then(Value::as_integer);

        let data = (msg_type == MetadataMessageType::Data).then(|| payload.slice(consumed..));

        Ok(Self {
            msg_type,
            piece,
            total_size,
            data,
        })
    }
}

/// Number of pieces needed to carry `metadata_size` bytes.
pub fn metadata_piece_count(metadata_size: usize) -> usize {
    metadata_size.div_ceil(METADATA_PIECE_SIZE)
}

/// Exact length of `piece` for metadata of `total_size` bytes, 0 if out of range.
pub fn metadata_piece_size(piece: u32, total_size: usize) -> usize {
    let offset = piece as usize * METADATA_PIECE_SIZE;
    if offset >= total_size {
        0
    } else {
        (total_size - offset).min(METADATA_PIECE_SIZE)
    }
}

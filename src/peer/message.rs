use super::error::PeerError;
use super::peer_id::PeerId;
use crate::constants::{
    DHT_BIT, EXTENDED_MESSAGE_ID, EXTENSION_BIT, EXTENSION_BYTE, HANDSHAKE_LEN, PROTOCOL_STRING,
};
use crate::metainfo::InfoHash;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// The 68-byte BitTorrent handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    pub reserved: [u8; 8],
    pub info_hash: InfoHash,
    pub peer_id: PeerId,
}

impl Handshake {
    /// A handshake advertising the extension protocol and DHT support.
    pub fn new(info_hash: InfoHash, peer_id: PeerId) -> Self {
        let mut reserved = [0u8; 8];
        reserved[EXTENSION_BYTE] |= EXTENSION_BIT;
        reserved[7] |= DHT_BIT;
        Self {
            reserved,
            info_hash,
            peer_id,
        }
    }

    pub fn supports_extension_protocol(&self) -> bool {
        (self.reserved[EXTENSION_BYTE] & EXTENSION_BIT) != 0
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(HANDSHAKE_LEN);
        buf.put_u8(PROTOCOL_STRING.len() as u8);
        buf.put_slice(PROTOCOL_STRING);
        buf.put_slice(&self.reserved);
        buf.put_slice(self.info_hash.as_bytes());
        buf.put_slice(self.peer_id.as_bytes());
        buf.freeze()
    }

    pub fn decode(data: &[u8]) -> Result<Self, PeerError> {
        if data.len() < HANDSHAKE_LEN {
            return Err(PeerError::InvalidHandshake);
        }

        if usize::from(data[0]) != PROTOCOL_STRING.len() || &data[1..20] != PROTOCOL_STRING {
            return Err(PeerError::InvalidHandshake);
        }

        let mut reserved = [0u8; 8];
        reserved.copy_from_slice(&data[20..28]);

        let info_hash =
            InfoHash::from_bytes(&data[28..48]).map_err(|_| PeerError::InvalidHandshake)?;
        let peer_id = PeerId::from_bytes(&data[48..68]).ok_or(PeerError::InvalidHandshake)?;

        Ok(Self {
            reserved,
            info_hash,
            peer_id,
        })
    }

    /// Decodes a peer's handshake and checks it is usable for `expected`.
    ///
    /// The protocol prefix must match, bytes 28..48 must equal the info-hash
    /// we asked for, and the peer must support the extension protocol.
    pub fn validate(data: &[u8], expected: &InfoHash) -> Result<Self, PeerError> {
        let handshake = Self::decode(data)?;
        if handshake.info_hash != *expected || !handshake.supports_extension_protocol() {
            return Err(PeerError::InvalidHandshake);
        }
        Ok(handshake)
    }
}

/// A length-prefixed peer wire message.
///
/// Only extension messages matter to a metadata fetcher; every other
/// message id is kept as [`PeerMessage::Other`] and ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerMessage {
    KeepAlive,
    Extended { id: u8, payload: Bytes },
    Other { id: u8 },
}

impl PeerMessage {
    /// Encodes the message including its 4-byte length prefix.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();

        match self {
            PeerMessage::KeepAlive => {
                buf.put_u32(0);
            }
            PeerMessage::Extended { id, payload } => {
                buf.put_u32(2 + payload.len() as u32);
                buf.put_u8(EXTENDED_MESSAGE_ID);
                buf.put_u8(*id);
                buf.put_slice(payload);
            }
            PeerMessage::Other { id } => {
                buf.put_u32(1);
                buf.put_u8(*id);
            }
        }

        buf.freeze()
    }

    /// Decodes a message body, i.e. a frame without its length prefix.
    pub fn decode(mut body: Bytes) -> Result<Self, PeerError> {
        if body.is_empty() {
            return Ok(PeerMessage::KeepAlive);
        }

        let id = body.get_u8();
        if id != EXTENDED_MESSAGE_ID {
            return Ok(PeerMessage::Other { id });
        }

        if body.remaining() < 1 {
            return Err(PeerError::InvalidMessage("extended too short".into()));
        }
        let ext_id = body.get_u8();

        Ok(PeerMessage::Extended {
            id: ext_id,
            payload: body,
        })
    }
}

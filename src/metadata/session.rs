use crate::constants::{EXTENSION_HANDSHAKE_ID, METADATA_PIECE_SIZE, UT_METADATA_ID};
use crate::metainfo::InfoHash;
use crate::peer::{
    metadata_piece_count, metadata_piece_size, ExtensionHandshake, Handshake, MetadataMessage,
    MetadataMessageType, PeerError, PeerId, PeerMessage, PeerTransport, UT_METADATA,
};
use bytes::Bytes;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::{debug, trace};

/// One attempt to download the metadata of `info_hash` from one peer.
///
/// The session sends the handshake and the extension handshake, requests
/// every piece as soon as the peer announces the metadata size, and
/// assembles the pieces until their SHA-1 matches the info-hash.
#[derive(Debug)]
pub struct MetadataSession {
    info_hash: InfoHash,
    peer_addr: SocketAddr,
    max_metadata_size: usize,
    handshake_done: bool,
    ut_metadata: u8,
    metadata_size: usize,
    buffer: Vec<u8>,
    received: Vec<bool>,
    bytes_received: usize,
}

impl MetadataSession {
    pub fn new(info_hash: InfoHash, peer_addr: SocketAddr, max_metadata_size: usize) -> Self {
        Self {
            info_hash,
            peer_addr,
            max_metadata_size,
            handshake_done: false,
            ut_metadata: 0,
            metadata_size: 0,
            buffer: Vec::new(),
            received: Vec::new(),
            bytes_received: 0,
        }
    }

    /// Connects and runs the exchange to completion.
    ///
    /// Returns the raw, verified metadata. The connection is closed on
    /// every path; dropping the future closes it too.
    pub async fn run(mut self) -> Result<Bytes, PeerError> {
        let mut transport = PeerTransport::connect(self.peer_addr).await?;
        let result = self.exchange(&mut transport).await;
        let _ = transport.shutdown().await;
        result
    }

    async fn exchange(&mut self, transport: &mut PeerTransport) -> Result<Bytes, PeerError> {
        transport
            .send_handshake(&Handshake::new(self.info_hash, PeerId::generate()))
            .await?;
        transport.receive_handshake(&self.info_hash).await?;

        let ours = ExtensionHandshake::with_extensions(&[(UT_METADATA, UT_METADATA_ID)]);
        transport
            .send_message(&PeerMessage::Extended {
                id: EXTENSION_HANDSHAKE_ID,
                payload: ours.encode()?,
            })
            .await?;

        loop {
            let PeerMessage::Extended { id, payload } = transport.receive_message().await? else {
                continue;
            };

            if id == EXTENSION_HANDSHAKE_ID {
                for request in self.on_extension_handshake(&payload)? {
                    transport.send_message(&request).await?;
                }
            } else if id == UT_METADATA_ID {
                if let Some(metadata) = self.on_metadata_message(&payload)? {
                    return Ok(metadata);
                }
            }
        }
    }

    /// Accepts the peer's extension handshake and returns the piece requests to send.
    ///
    /// Only the first usable handshake counts. One without `ut_metadata`
    /// or `metadata_size` is ignored; a size outside
    /// `(0, max_metadata_size)` fails the session.
    pub fn on_extension_handshake(&mut self, payload: &[u8]) -> Result<Vec<PeerMessage>, PeerError> {
        if self.handshake_done {
            return Ok(Vec::new());
        }

        let handshake = match ExtensionHandshake::decode(payload) {
            Ok(hs) => hs,
            Err(e) => {
                debug!("undecodable extension handshake from {}: {}", self.peer_addr, e);
                return Ok(Vec::new());
            }
        };

        let (Some(ut_metadata), Some(metadata_size)) =
            (handshake.get_extension_id(UT_METADATA), handshake.metadata_size)
        else {
            debug!("{} does not offer metadata for {}", self.peer_addr, self.info_hash);
            return Ok(Vec::new());
        };

        let metadata_size = usize::try_from(metadata_size)
            .ok()
            .filter(|&size| size > 0 && size < self.max_metadata_size)
            .ok_or_else(|| PeerError::InvalidMetadata(format!("metadata size {}", metadata_size)))?;

        self.ut_metadata = ut_metadata;
        self.metadata_size = metadata_size;
        self.buffer = vec![0u8; metadata_size];
        let pieces = metadata_piece_count(metadata_size);
        self.received = vec![false; pieces];
        self.handshake_done = true;

        let mut requests = Vec::with_capacity(pieces);
        for piece in 0..pieces as u32 {
            requests.push(PeerMessage::Extended {
                id: self.ut_metadata,
                payload: MetadataMessage::request(piece).encode()?,
            });
        }
        Ok(requests)
    }

    /// Handles a ut_metadata message, returning the metadata once complete and verified.
    pub fn on_metadata_message(&mut self, payload: &Bytes) -> Result<Option<Bytes>, PeerError> {
        if !self.handshake_done {
            return Ok(None);
        }

        let message = match MetadataMessage::decode(payload) {
            Ok(message) => message,
            Err(e) => {
                debug!("undecodable ut_metadata message from {}: {}", self.peer_addr, e);
                return Ok(None);
            }
        };

        match message.msg_type {
            MetadataMessageType::Data => {
                let data = message.data.unwrap_or_default();
                self.store_piece(message.piece, &data)?;
                Ok(self.try_complete())
            }
            MetadataMessageType::Reject => {
                debug!(
                    "{} rejected metadata piece {} of {}",
                    self.peer_addr, message.piece, self.info_hash
                );
                Ok(None)
            }
            MetadataMessageType::Request => Ok(None),
        }
    }

    fn store_piece(&mut self, piece: u32, data: &[u8]) -> Result<(), PeerError> {
        let index = piece as usize;
        if index >= self.received.len() {
            return Err(PeerError::InvalidMetadata(format!("piece {} out of range", piece)));
        }

        let expected = metadata_piece_size(piece, self.metadata_size);
        if data.len() != expected {
            return Err(PeerError::InvalidMetadata(format!(
                "piece {} has {} bytes, expected {}",
                piece,
                data.len(),
                expected
            )));
        }

        let offset = index * METADATA_PIECE_SIZE;
        self.buffer[offset..offset + expected].copy_from_slice(data);
        if !self.received[index] {
            self.received[index] = true;
            self.bytes_received += expected;
        }
        trace!("piece {} of {} from {}", piece, self.info_hash, self.peer_addr);
        Ok(())
    }

    fn try_complete(&mut self) -> Option<Bytes> {
        if self.bytes_received != self.metadata_size {
            return None;
        }

        if InfoHash::from_metadata(&self.buffer) == self.info_hash {
            return Some(Bytes::from(std::mem::take(&mut self.buffer)));
        }

        debug!(
            "metadata from {} does not hash to {}, waiting for fresh pieces",
            self.peer_addr, self.info_hash
        );
        self.received.iter_mut().for_each(|r| *r = false);
        self.bytes_received = 0;
        None
    }
}

/// Runs one session under an overall deadline.
///
/// Every failure becomes `None`: timeouts and refused connections silently,
/// anything else with a debug log.
pub async fn fetch_metadata(
    info_hash: InfoHash,
    peer_addr: SocketAddr,
    max_metadata_size: usize,
    fetch_timeout: Duration,
) -> Option<Bytes> {
    let session = MetadataSession::new(info_hash, peer_addr, max_metadata_size);
    let result = tokio::time::timeout(fetch_timeout, session.run())
        .await
        .unwrap_or(Err(PeerError::Timeout));

    match result {
        Ok(metadata) => Some(metadata),
        Err(PeerError::Timeout) => {
            trace!("metadata fetch for {} from {} timed out", info_hash, peer_addr);
            None
        }
        Err(PeerError::Io(e)) if e.kind() == io::ErrorKind::ConnectionRefused => None,
        Err(e) => {
            debug!(
                "error retrieving metadata for {} from {}: {}",
                info_hash, peer_addr, e
            );
            None
        }
    }
}

use super::error::DhtError;
use super::message::{KrpcMessage, TransactionId};
use super::node::NodeId;
use super::transport::{TransportEvent, UdpTransport};
use crate::bencode::{decode, Value};
use crate::constants::NEIGHBOUR_PREFIX_LEN;
use crate::metainfo::InfoHash;
use bytes::Bytes;
use std::net::SocketAddr;
use tracing::trace;

/// What the RPC layer hands to the crawler.
#[derive(Debug)]
pub enum RpcEvent {
    /// A decoded KRPC message, not yet validated.
    Message { message: Value, from: SocketAddr },
    /// The transport dropped outbound datagrams.
    BandwidthExhausted { dropped: usize },
}

/// Typed KRPC operations over a [`UdpTransport`].
///
/// Outbound messages are fire-and-forget: nothing is tracked per
/// transaction and a message that fails to encode is simply not sent.
pub struct Rpc {
    transport: UdpTransport,
}

impl Rpc {
    pub async fn bind(addr: SocketAddr) -> Result<Self, DhtError> {
        Ok(Self {
            transport: UdpTransport::bind(addr).await?,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, DhtError> {
        self.transport.local_addr()
    }

    /// Waits for the next decodable message or congestion signal.
    ///
    /// Datagrams from port 0 and datagrams that are not valid bencode are
    /// dropped here.
    pub async fn next_event(&mut self) -> Result<RpcEvent, DhtError> {
        loop {
            match self.transport.next_event().await? {
                TransportEvent::Datagram { data, from } => {
                    if from.port() == 0 {
                        continue;
                    }
                    match decode(&data) {
                        Ok(message) => return Ok(RpcEvent::Message { message, from }),
                        Err(e) => trace!("dropping undecodable datagram from {}: {}", from, e),
                    }
                }
                TransportEvent::BandwidthExhausted { dropped } => {
                    return Ok(RpcEvent::BandwidthExhausted { dropped });
                }
            }
        }
    }

    /// Sends `find_node` with `id` as both the sender id and the target.
    pub fn find_node(&self, id: &NodeId, addr: SocketAddr) {
        self.send(
            &KrpcMessage::FindNode {
                transaction_id: generate_transaction_id(),
                sender_id: *id,
                target: *id,
            },
            addr,
        );
    }

    pub fn respond_announce_peer(&self, transaction_id: TransactionId, id: &NodeId, addr: SocketAddr) {
        self.send(
            &KrpcMessage::AnnouncePeerResponse { transaction_id, id: *id },
            addr,
        );
    }

    /// Answers `get_peers` without disclosing peers.
    ///
    /// The reply carries an id close to the requested info-hash, an empty
    /// `nodes` list, and a token built from the info-hash and the local id.
    pub fn respond_get_peers(
        &self,
        transaction_id: TransactionId,
        info_hash: &InfoHash,
        local_id: &NodeId,
        addr: SocketAddr,
    ) {
        let mut token = [0u8; 20];
        token[..NEIGHBOUR_PREFIX_LEN].copy_from_slice(&info_hash.0[..NEIGHBOUR_PREFIX_LEN]);
        token[NEIGHBOUR_PREFIX_LEN..].copy_from_slice(&local_id.0[NEIGHBOUR_PREFIX_LEN..]);

        self.send(
            &KrpcMessage::GetPeersResponse {
                transaction_id,
                id: NodeId::neighbour(info_hash.as_bytes(), local_id),
                token: Bytes::copy_from_slice(&token),
            },
            addr,
        );
    }

    fn send(&self, message: &KrpcMessage, addr: SocketAddr) {
        match message.encode() {
            Ok(data) => self.transport.send_to(&data, addr),
            Err(e) => trace!("not sending unencodable message to {}: {}", addr, e),
        }
    }
}

fn generate_transaction_id() -> TransactionId {
    let id: [u8; 2] = rand::random();
    Bytes::copy_from_slice(&id)
}

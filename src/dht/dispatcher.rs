use super::message::TransactionId;
use super::node::{decode_nodes, is_valid_port, Node, NodeId};
use crate::bencode::Value;
use crate::metainfo::InfoHash;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Receiver of the inbound messages the crawler cares about.
pub trait DhtHandler {
    /// A response carried a well-formed `nodes` list.
    fn on_find_node(&mut self, nodes: Vec<Node>);

    /// A node asked for peers of `info_hash`.
    fn on_get_peers(&mut self, transaction_id: TransactionId, info_hash: InfoHash, from: SocketAddr);

    /// A node announced that `peer_addr` is downloading `info_hash`.
    ///
    /// `from` is where the query came from and where the reply goes;
    /// `peer_addr` is where the metadata can be fetched, or `None` when the
    /// announced port is unusable.
    fn on_announce_peer(
        &mut self,
        transaction_id: TransactionId,
        sender_id: NodeId,
        info_hash: InfoHash,
        peer_addr: Option<SocketAddr>,
        from: SocketAddr,
    );
}

/// Shapes of inbound KRPC messages worth acting on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    FindNodeResponse {
        nodes: Vec<Node>,
    },
    GetPeers {
        transaction_id: TransactionId,
        info_hash: InfoHash,
    },
    AnnouncePeer {
        transaction_id: TransactionId,
        sender_id: NodeId,
        info_hash: InfoHash,
        peer_addr: Option<SocketAddr>,
    },
}

impl InboundMessage {
    /// Classifies a decoded message by its shape.
    ///
    /// Returns `None` for anything that is not one of the three shapes or
    /// that lacks a required argument. A response whose `nodes` field is
    /// present but malformed is ignored entirely.
    pub fn classify(message: &Value, from: SocketAddr) -> Option<Self> {
        if let Some(nodes) = message.get(b"r").and_then(|r| r.get(b"nodes")) {
            let nodes = nodes.as_bytes()?;
            return decode_nodes(nodes)
                .ok()
                .map(|nodes| InboundMessage::FindNodeResponse { nodes });
        }

        match message.get(b"q").and_then(Value::as_bytes)?.as_ref() {
            b"get_peers" => {
                let args = message.get(b"a")?;
                Some(InboundMessage::GetPeers {
                    transaction_id: message.get(b"t")?.as_bytes()?.clone(),
                    info_hash: InfoHash::from_bytes(args.get(b"info_hash")?.as_bytes()?).ok()?,
                })
            }
            b"announce_peer" => {
                let args = message.get(b"a")?;
                let sender_id = NodeId::from_bytes(args.get(b"id")?.as_bytes()?).ok()?;
                let info_hash = InfoHash::from_bytes(args.get(b"info_hash")?.as_bytes()?).ok()?;
                let transaction_id = message.get(b"t")?.as_bytes()?.clone();
                let port = args.get(b"port")?.as_integer()?;

                let implied_port = args
                    .get(b"implied_port")
                    .and_then(Value::as_integer)
                    .is_some_and(|v| v != 0);

                // an unusable declared port still gets a reply, just no fetch
                let peer_port = if implied_port {
                    Some(from.port())
                } else if is_valid_port(port) {
                    u16::try_from(port).ok()
                } else {
                    None
                };

                Some(InboundMessage::AnnouncePeer {
                    transaction_id,
                    sender_id,
                    info_hash,
                    peer_addr: peer_port.map(|port| SocketAddr::new(from.ip(), port)),
                })
            }
            _ => None,
        }
    }
}

/// Routes inbound messages to a [`DhtHandler`] while running.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    running: Arc<AtomicBool>,
}

impl Dispatcher {
    pub fn new(running: Arc<AtomicBool>) -> Self {
        Self { running }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Classifies `message` and invokes the matching handler method.
    ///
    /// Returns whether a handler was called.
    pub fn dispatch<H: DhtHandler>(&self, message: &Value, from: SocketAddr, handler: &mut H) -> bool {
        if !self.is_running() {
            return false;
        }

        match InboundMessage::classify(message, from) {
            Some(InboundMessage::FindNodeResponse { nodes }) => handler.on_find_node(nodes),
            Some(InboundMessage::GetPeers {
                transaction_id,
                info_hash,
            }) => handler.on_get_peers(transaction_id, info_hash, from),
            Some(InboundMessage::AnnouncePeer {
                transaction_id,
                sender_id,
                info_hash,
                peer_addr,
            }) => handler.on_announce_peer(transaction_id, sender_id, info_hash, peer_addr, from),
            None => return false,
        }
        true
    }
}

use super::error::DhtError;
use super::node::NodeId;
use crate::bencode::{encode, Value};
use bytes::Bytes;

pub type TransactionId = Bytes;

/// Every KRPC message the crawler sends.
///
/// The crawler issues a single kind of query and answers only the two
/// queries that lead to info-hashes; everything else it receives is ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KrpcMessage {
    FindNode {
        transaction_id: TransactionId,
        sender_id: NodeId,
        target: NodeId,
    },
    GetPeersResponse {
        transaction_id: TransactionId,
        id: NodeId,
        token: Bytes,
    },
    AnnouncePeerResponse {
        transaction_id: TransactionId,
        id: NodeId,
    },
}

impl KrpcMessage {
    pub fn transaction_id(&self) -> &TransactionId {
        match self {
            KrpcMessage::FindNode { transaction_id, .. }
            | KrpcMessage::GetPeersResponse { transaction_id, .. }
            | KrpcMessage::AnnouncePeerResponse { transaction_id, .. } => transaction_id,
        }
    }

    pub fn to_value(&self) -> Value {
        let t = Value::Bytes(self.transaction_id().clone());

        match self {
            KrpcMessage::FindNode {
                sender_id, target, ..
            } => Value::dict([
                (&b"t"[..], t),
                (b"y", Value::string("q")),
                (b"q", Value::string("find_node")),
                (
                    b"a",
                    Value::dict([
                        (&b"id"[..], Value::bytes(sender_id.as_bytes())),
                        (b"target", Value::bytes(target.as_bytes())),
                    ]),
                ),
            ]),
            KrpcMessage::GetPeersResponse { id, token, .. } => Value::dict([
                (&b"t"[..], t),
                (b"y", Value::string("r")),
                (
                    b"r",
                    Value::dict([
                        (&b"id"[..], Value::bytes(id.as_bytes())),
                        (b"nodes", Value::bytes(b"")),
                        (b"token", Value::Bytes(token.clone())),
                    ]),
                ),
            ]),
            KrpcMessage::AnnouncePeerResponse { id, .. } => Value::dict([
                (&b"t"[..], t),
                (b"y", Value::string("r")),
                (b"r", Value::dict([(&b"id"[..], Value::bytes(id.as_bytes()))])),
            ]),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, DhtError> {
        Ok(encode(&self.to_value())?)
    }
}

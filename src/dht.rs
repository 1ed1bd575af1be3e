//! Mainline DHT crawler (BEP-5)
//!
//! The crawler does not take part in the DHT as a well-behaved node. It
//! keeps no buckets, never stores peers, and answers only the queries that
//! carry info-hashes. Instead it floods `find_node` queries with forged
//! neighbour ids so that as many nodes as possible learn about it and send
//! it their `get_peers` and `announce_peer` traffic.
//!
//! Layers, bottom-up:
//!
//! - [`UdpTransport`] - non-blocking sends with congestion signalling
//! - [`Rpc`] - KRPC encode/decode and the three outbound messages
//! - [`Dispatcher`] - classification of inbound messages into a [`DhtHandler`]
//! - [`Crawler`] - the tick loop, congestion control, and metadata hand-off

mod crawler;
mod dispatcher;
mod error;
mod message;
mod node;
mod routing;
mod rpc;
mod transport;

pub use crawler::{Crawler, CrawlerHandle};
pub use dispatcher::{DhtHandler, Dispatcher, InboundMessage};
pub use error::DhtError;
pub use message::{KrpcMessage, TransactionId};
pub use node::{decode_nodes, is_public_ipv4, is_valid_port, Node, NodeId};
pub use routing::RoutingTable;
pub use rpc::{Rpc, RpcEvent};
pub use transport::{is_bandwidth_exhausted, TransportEvent, UdpTransport};

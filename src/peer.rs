//! Peer wire protocol subset used to fetch metadata (BEP-3, BEP-9, BEP-10).
//!
//! A metadata fetch needs only the handshake, length-prefixed framing, the
//! extension handshake, and `ut_metadata` messages. Everything else a peer
//! sends is read and discarded.

mod error;
mod extension;
mod message;
mod metadata;
mod peer_id;
mod transport;

pub use error::PeerError;
pub use extension::{ExtensionHandshake, UT_METADATA};
pub use message::{Handshake, PeerMessage};
pub use metadata::{metadata_piece_count, metadata_piece_size, MetadataMessage, MetadataMessageType};
pub use peer_id::PeerId;
pub use transport::PeerTransport;

//! Metadata download from swarm peers (BEP-9).
//!
//! - [`MetadataSession`] - one peer, one info-hash: handshake, extension
//!   handshake, piece requests, assembly, SHA-1 verification
//! - [`fetch_metadata`] - a session under an overall timeout, failures folded into `None`
//! - [`MetadataFetcher`] - per-info-hash fetch groups with a worker cap and
//!   first-success cancellation

mod fetcher;
mod session;

pub use fetcher::{GroupState, MetadataFetcher, MetadataResult, PeerWorker, Worker};
pub use session::{fetch_metadata, MetadataSession};

#[cfg(test)]
mod tests;

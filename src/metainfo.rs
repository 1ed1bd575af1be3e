//! Info-hashes and the indexed view of fetched torrent metadata.
//!
//! - [`InfoHash`] - 20-byte SHA-1 identifier of a torrent
//! - [`TorrentInfo`] - name and file listing extracted from an info dictionary

mod error;
mod info_hash;
mod torrent;

pub use error::MetainfoError;
pub use info_hash::InfoHash;
pub use torrent::{TorrentFile, TorrentInfo};

#[cfg(test)]
mod tests;

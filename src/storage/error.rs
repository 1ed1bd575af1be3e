use thiserror::Error;

use crate::metainfo::MetainfoError;

/// Errors raised by a [`TorrentStore`](super::TorrentStore).
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backing store is unavailable or misbehaving.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// The store refused the record, e.g. a duplicate info hash.
    #[error("storing error: {0}")]
    Storing(String),

    /// The metadata is not a usable info dictionary.
    #[error("metainfo error: {0}")]
    Metainfo(#[from] MetainfoError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

//! Persistence of fetched torrent metadata.
//!
//! The crawler needs two things from storage: whether an info-hash is
//! already known, and a place to put new metadata. [`TorrentStore`] is that
//! narrow interface; [`MemoryStore`] and [`DirectoryStore`] implement it.
//!
//! # Examples
//!
//! ```
//! use dhtseek::bencode::decode;
//! use dhtseek::metainfo::InfoHash;
//! use dhtseek::storage::{MemoryStore, StorageError, TorrentStore};
//!
//! let store = MemoryStore::new();
//! let info_hash = InfoHash([1u8; 20]);
//! let metadata = decode(b"d6:lengthi42e4:name8:file.txte").unwrap();
//!
//! let info = store.store_metadata(&info_hash, &metadata).unwrap();
//! assert_eq!(info.name, "file.txt");
//! assert!(store.exists(&info_hash));
//!
//! assert!(matches!(
//!     store.store_metadata(&info_hash, &metadata),
//!     Err(StorageError::Storing(_))
//! ));
//! ```

mod directory;
mod error;
mod memory;

pub use directory::DirectoryStore;
pub use error::StorageError;
pub use memory::MemoryStore;

use crate::bencode::Value;
use crate::metainfo::{InfoHash, MetainfoError, TorrentInfo};

/// Where decoded metadata ends up.
///
/// Implementations may block; the crawler calls
/// [`store_metadata`](Self::store_metadata) off the crawl loop.
pub trait TorrentStore: Send + Sync + 'static {
    /// Whether metadata for `info_hash` has already been stored.
    fn exists(&self, info_hash: &InfoHash) -> bool;

    /// Persists decoded metadata and returns its indexed view.
    ///
    /// # Errors
    ///
    /// [`StorageError::Storing`] if the info-hash is already stored or a
    /// file path is unsafe, [`StorageError::Metainfo`] if the metadata is
    /// not an info dictionary.
    fn store_metadata(&self, info_hash: &InfoHash, metadata: &Value) -> Result<TorrentInfo, StorageError>;
}

/// Projects metadata, treating unsafe paths as a rejected record.
fn project(metadata: &Value) -> Result<TorrentInfo, StorageError> {
    TorrentInfo::from_value(metadata).map_err(|e| match e {
        MetainfoError::InvalidField("path") => {
            StorageError::Storing("path component contains '/'".into())
        }
        e => StorageError::Metainfo(e),
    })
}

use super::{project, StorageError, TorrentStore};
use crate::bencode::{encode, Value};
use crate::metainfo::{InfoHash, TorrentInfo};
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Writes each torrent as `<hex info-hash>.torrent` in a directory.
///
/// The file holds a bencoded `{"info": metadata}` dictionary, which any
/// BitTorrent client can open. Files are created exclusively, so an
/// info-hash is stored at most once even across restarts.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    /// Opens `root`, creating it if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, info_hash: &InfoHash) -> PathBuf {
        self.root.join(format!("{}.torrent", info_hash.to_hex()))
    }
}

impl TorrentStore for DirectoryStore {
    fn exists(&self, info_hash: &InfoHash) -> bool {
        self.path_for(info_hash).exists()
    }

    fn store_metadata(&self, info_hash: &InfoHash, metadata: &Value) -> Result<TorrentInfo, StorageError> {
        let info = project(metadata)?;
        let torrent = encode(&Value::dict([(&b"info"[..], metadata.clone())]))
            .map_err(|e| StorageError::Persistence(e.to_string()))?;

        let path = self.path_for(info_hash);
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(StorageError::Storing(format!("{} already stored", info_hash)));
            }
            Err(e) => return Err(e.into()),
        };

        if let Err(e) = file.write_all(&torrent).and_then(|_| file.sync_all()) {
            let _ = std::fs::remove_file(&path);
            return Err(e.into());
        }
        Ok(info)
    }
}

use super::{project, StorageError, TorrentStore};
use crate::bencode::Value;
use crate::metainfo::{InfoHash, TorrentInfo};
use parking_lot::RwLock;
use std::collections::HashMap;

/// In-process store, lost on exit.
#[derive(Debug, Default)]
pub struct MemoryStore {
    torrents: RwLock<HashMap<InfoHash, TorrentInfo>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, info_hash: &InfoHash) -> Option<TorrentInfo> {
        self.torrents.read().get(info_hash).cloned()
    }

    pub fn len(&self) -> usize {
        self.torrents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.torrents.read().is_empty()
    }
}

impl TorrentStore for MemoryStore {
    fn exists(&self, info_hash: &InfoHash) -> bool {
        self.torrents.read().contains_key(info_hash)
    }

    fn store_metadata(&self, info_hash: &InfoHash, metadata: &Value) -> Result<TorrentInfo, StorageError> {
        let info = project(metadata)?;

        let mut torrents = self.torrents.write();
        if torrents.contains_key(info_hash) {
            return Err(StorageError::Storing(format!("{} already stored", info_hash)));
        }
        torrents.insert(*info_hash, info.clone());
        Ok(info)
    }
}

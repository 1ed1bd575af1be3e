//! dhtseek - a BitTorrent Mainline DHT crawler
//!
//! The crawler joins the DHT, makes itself known to as many nodes as it can,
//! and listens for the info-hashes they ask about and announce. For every
//! new announced info-hash it downloads the torrent metadata straight from
//! the announcing peer and hands it to a store.
//!
//! # Modules
//!
//! - [`bencode`] - BEP-3 Bencode encoding/decoding
//! - [`dht`] - BEP-5 KRPC transport, dispatcher, and the crawl loop
//! - [`peer`] - BEP-3/10 handshake, framing, and the BEP-9 ut_metadata messages
//! - [`metadata`] - BEP-9 metadata sessions and bounded per-info-hash fetching
//! - [`metainfo`] - Info-hashes and the name/file projection of metadata
//! - [`storage`] - Where fetched metadata ends up
//! - [`config`] - Crawler settings and defaults

pub mod bencode;
pub mod config;
pub mod constants;
pub mod dht;
pub mod metadata;
pub mod metainfo;
pub mod peer;
pub mod storage;

pub use bencode::{decode, encode, BencodeError, Value};
pub use config::{BootstrapNode, ConfigError, CrawlerConfig};
pub use dht::{Crawler, CrawlerHandle, DhtError, Node, NodeId};
pub use metadata::{fetch_metadata, MetadataFetcher, MetadataSession};
pub use metainfo::{InfoHash, MetainfoError, TorrentInfo};
pub use peer::{PeerError, PeerId};
pub use storage::{DirectoryStore, MemoryStore, StorageError, TorrentStore};

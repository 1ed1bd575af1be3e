//! Protocol constants and tuning defaults.

use std::time::Duration;

// ============================================================================
// Client identification
// ============================================================================

/// Client ID prefix for peer ID generation (Azureus-style)
pub const CLIENT_PREFIX: &[u8; 8] = b"-DS0001-";

// ============================================================================
// DHT
// ============================================================================

/// Default DHT listen port
pub const DEFAULT_PORT: u16 = 6881;

/// Well-known DHT bootstrap nodes
pub const DHT_BOOTSTRAP_NODES: &[&str] = &[
    "router.bittorrent.com:6881",
    "dht.transmissionbt.com:6881",
    "router.utorrent.com:6881",
];

/// Size of a compact node record: 20-byte id, IPv4 address, port
pub const COMPACT_NODE_LEN: usize = 26;

/// Number of leading bytes borrowed from the target id when forging a neighbour id
pub const NEIGHBOUR_PREFIX_LEN: usize = 15;

/// Largest datagram we accept
pub const MAX_DATAGRAM_SIZE: usize = 65535;

/// Interval between crawl ticks
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Initial routing table capacity
pub const DEFAULT_MAX_NEIGHBOURS: usize = 500;

/// Routing table growth per tick, as numerator/denominator
pub const NEIGHBOUR_GROWTH: (usize, usize) = (101, 100);

/// Routing table shrink on congestion, as numerator/denominator
pub const NEIGHBOUR_BACKOFF: (usize, usize) = (9, 10);

/// Below this capacity congestion is reported instead of shrinking further
pub const NEIGHBOUR_FLOOR: usize = 200;

/// Time allowed for resolving bootstrap host names
pub const BOOTSTRAP_RESOLVE_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// Metadata
// ============================================================================

/// Concurrent workers allowed per info-hash
pub const MAX_WORKERS_PER_INFO_HASH: usize = 3;

/// Overall metadata fetch timeout per worker
pub const METADATA_FETCH_TIMEOUT: Duration = Duration::from_secs(100);

/// Largest metadata accepted from a peer (exclusive)
pub const MAX_METADATA_SIZE: usize = 10_000_000;

/// Metadata piece size (BEP-9)
pub const METADATA_PIECE_SIZE: usize = 16384;

/// Largest peer wire frame we buffer
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

// ============================================================================
// Protocol constants
// ============================================================================

/// BitTorrent protocol string
pub const PROTOCOL_STRING: &[u8; 19] = b"BitTorrent protocol";

/// Length of the BitTorrent handshake
pub const HANDSHAKE_LEN: usize = 68;

/// Byte of the reserved field carrying the extension protocol bit
pub const EXTENSION_BYTE: usize = 5;

/// Extension protocol bit (BEP-10)
pub const EXTENSION_BIT: u8 = 0x10;

/// DHT support bit (BEP-5)
pub const DHT_BIT: u8 = 0x01;

/// Peer wire message ID of extension messages (BEP-10)
pub const EXTENDED_MESSAGE_ID: u8 = 20;

/// Extension handshake message ID
pub const EXTENSION_HANDSHAKE_ID: u8 = 0;

/// ut_metadata extension ID we advertise
pub const UT_METADATA_ID: u8 = 1;

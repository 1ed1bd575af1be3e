use super::error::DhtError;
use crate::constants::{COMPACT_NODE_LEN, NEIGHBOUR_PREFIX_LEN};
use rand::Rng as _;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4};

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub [u8; 20]);

impl NodeId {
    pub fn generate() -> Self {
        let mut id = [0u8; 20];
        rand::rng().fill(&mut id);
        Self(id)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DhtError> {
        let id: [u8; 20] = bytes.try_into().map_err(|_| DhtError::InvalidNodeId)?;
        Ok(Self(id))
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Forges an id that looks close to `target` in XOR distance.
    ///
    /// The first 15 bytes are borrowed from `target`, the last 5 from
    /// `local`, so every node queried with this id sees a sender that lives
    /// in its own neighbourhood and answers with its closest contacts.
    pub fn neighbour(target: &[u8; 20], local: &NodeId) -> Self {
        let mut id = [0u8; 20];
        id[..NEIGHBOUR_PREFIX_LEN].copy_from_slice(&target[..NEIGHBOUR_PREFIX_LEN]);
        id[NEIGHBOUR_PREFIX_LEN..].copy_from_slice(&local.0[..20 - NEIGHBOUR_PREFIX_LEN]);
        Self(id)
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({:02x}{:02x}..)", self.0[0], self.0[1])
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// A DHT contact: node id plus UDP address.
///
/// Equality is structural over the id and the full socket address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Node {
    pub id: NodeId,
    pub addr: SocketAddr,
}

impl Node {
    pub fn new(id: NodeId, addr: SocketAddr) -> Self {
        Self { id, addr }
    }

    /// Creates the local identity with a random id.
    pub fn generate(addr: SocketAddr) -> Self {
        Self::new(NodeId::generate(), addr)
    }

    /// Whether this node is worth querying: a usable port on a public IPv4 address.
    pub fn is_valid(&self) -> bool {
        is_valid_port(i64::from(self.addr.port()))
            && match self.addr.ip() {
                IpAddr::V4(ip) => is_public_ipv4(&ip),
                IpAddr::V6(_) => false,
            }
    }

    pub fn from_compact(data: &[u8]) -> Option<Self> {
        if data.len() != COMPACT_NODE_LEN {
            return None;
        }

        let id = NodeId::from_bytes(&data[..20]).ok()?;
        let ip = Ipv4Addr::new(data[20], data[21], data[22], data[23]);
        let port = u16::from_be_bytes([data[24], data[25]]);

        Some(Self::new(id, SocketAddr::V4(SocketAddrV4::new(ip, port))))
    }

    pub fn to_compact(&self) -> Option<[u8; COMPACT_NODE_LEN]> {
        let mut compact = [0u8; COMPACT_NODE_LEN];
        compact[..20].copy_from_slice(&self.id.0);

        match self.addr {
            SocketAddr::V4(v4) => {
                compact[20..24].copy_from_slice(&v4.ip().octets());
                compact[24..26].copy_from_slice(&v4.port().to_be_bytes());
                Some(compact)
            }
            SocketAddr::V6(_) => None,
        }
    }
}

/// Decodes a `nodes` field: a concatenation of 26-byte compact node records.
///
/// # Errors
///
/// Fails if the length is not a multiple of 26.
///
/// # Examples
///
/// ```
/// use dhtseek::dht::decode_nodes;
///
/// let mut data = vec![0xAB; 20];
/// data.extend_from_slice(&[58, 224, 54, 156, 0x1f, 0x73]);
/// let nodes = decode_nodes(&data).unwrap();
/// assert_eq!(nodes[0].addr.to_string(), "58.224.54.156:8051");
///
/// assert!(decode_nodes(&data[..25]).is_err());
/// ```
pub fn decode_nodes(data: &[u8]) -> Result<Vec<Node>, DhtError> {
    if data.len() % COMPACT_NODE_LEN != 0 {
        return Err(DhtError::InvalidMessage(format!(
            "nodes length {} is not a multiple of {}",
            data.len(),
            COMPACT_NODE_LEN
        )));
    }

    Ok(data
        .chunks_exact(COMPACT_NODE_LEN)
        .filter_map(Node::from_compact)
        .collect())
}

/// Ports carried in KRPC arguments are bencoded integers of any width.
pub fn is_valid_port(port: i64) -> bool {
    port > 0 && port < 65536
}

/// Rejects every range that cannot be a reachable DHT node on the internet.
pub fn is_public_ipv4(ip: &Ipv4Addr) -> bool {
    let octets = ip.octets();

    let shared = octets[0] == 100 && (octets[1] & 0xC0) == 64;
    let benchmarking = octets[0] == 198 && (octets[1] & 0xFE) == 18;
    let reserved = octets[0] >= 240;
    let this_network = octets[0] == 0;

    !(ip.is_private()
        || ip.is_loopback()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.is_broadcast()
        || ip.is_documentation()
        || ip.is_multicast()
        || shared
        || benchmarking
        || reserved
        || this_network)
}

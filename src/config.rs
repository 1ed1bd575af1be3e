//! Crawler configuration.
//!
//! Read once at start-up and passed by value into the crawler; nothing
//! re-reads it while running.

use crate::constants::{
    DEFAULT_MAX_NEIGHBOURS, DEFAULT_PORT, DHT_BOOTSTRAP_NODES, MAX_METADATA_SIZE,
    MAX_WORKERS_PER_INFO_HASH, METADATA_FETCH_TIMEOUT, TICK_INTERVAL,
};
use std::fmt;
use std::net::{Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid bootstrap node {0:?}: expected host:port")]
    InvalidBootstrapNode(String),

    #[error("invalid configuration: {0}")]
    Invalid(&'static str),
}

/// A `host:port` bootstrap router, resolved when needed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BootstrapNode {
    pub host: String,
    pub port: u16,
}

impl BootstrapNode {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl FromStr for BootstrapNode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidBootstrapNode(s.to_string());

        let (host, port) = s.trim().rsplit_once(':').ok_or_else(invalid)?;
        let host = host.trim_start_matches('[').trim_end_matches(']');
        let port: u16 = port.parse().map_err(|_| invalid())?;

        if host.is_empty() || port == 0 {
            return Err(invalid());
        }
        Ok(Self::new(host, port))
    }
}

impl fmt::Display for BootstrapNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    /// Default log filter, overridden by `RUST_LOG`.
    pub log_level: String,
    /// UDP address the DHT endpoint binds to.
    pub bind: SocketAddr,
    /// Routers queried whenever the routing table is empty.
    pub bootstrap_nodes: Vec<BootstrapNode>,
    /// Concurrent metadata workers allowed per info-hash.
    pub max_workers_per_info_hash: usize,
    /// Overall deadline of one metadata session.
    pub metadata_fetch_timeout: Duration,
    /// Metadata must be strictly smaller than this.
    pub max_metadata_size: usize,
    /// Time between crawl ticks.
    pub tick_interval: Duration,
    /// Initial routing table capacity.
    pub max_neighbours: usize,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            bind: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            bootstrap_nodes: DHT_BOOTSTRAP_NODES
                .iter()
                .filter_map(|node| node.parse().ok())
                .collect(),
            max_workers_per_info_hash: MAX_WORKERS_PER_INFO_HASH,
            metadata_fetch_timeout: METADATA_FETCH_TIMEOUT,
            max_metadata_size: MAX_METADATA_SIZE,
            tick_interval: TICK_INTERVAL,
            max_neighbours: DEFAULT_MAX_NEIGHBOURS,
        }
    }
}

impl CrawlerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bootstrap_nodes.is_empty() {
            return Err(ConfigError::Invalid("at least one bootstrap node is required"));
        }
        if self.max_workers_per_info_hash == 0 {
            return Err(ConfigError::Invalid("max_workers_per_info_hash must be positive"));
        }
        if self.metadata_fetch_timeout.is_zero() {
            return Err(ConfigError::Invalid("metadata_fetch_timeout must be positive"));
        }
        if self.max_metadata_size == 0 {
            return Err(ConfigError::Invalid("max_metadata_size must be positive"));
        }
        if self.tick_interval.is_zero() {
            return Err(ConfigError::Invalid("tick_interval must be positive"));
        }
        if self.max_neighbours == 0 {
            return Err(ConfigError::Invalid("max_neighbours must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CrawlerConfig::default();
        assert_eq!(config.bind.port(), 6881);
        assert_eq!(config.bootstrap_nodes.len(), 3);
        assert_eq!(
            config.bootstrap_nodes[0],
            BootstrapNode::new("router.bittorrent.com", 6881)
        );
        assert_eq!(config.max_workers_per_info_hash, 3);
        assert_eq!(config.metadata_fetch_timeout, Duration::from_secs(100));
        assert_eq!(config.max_neighbours, 500);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bootstrap_node_parse() {
        let node: BootstrapNode = "dht.transmissionbt.com:6881".parse().unwrap();
        assert_eq!(node.host, "dht.transmissionbt.com");
        assert_eq!(node.port, 6881);
        assert_eq!(node.to_string(), "dht.transmissionbt.com:6881");

        let v6: BootstrapNode = "[2001:db8::1]:6881".parse().unwrap();
        assert_eq!(v6.host, "2001:db8::1");
        assert_eq!(v6.to_string(), "[2001:db8::1]:6881");

        for bad in ["router.bittorrent.com", ":6881", "host:0", "host:70000", "host:abc"] {
            assert!(matches!(
                bad.parse::<BootstrapNode>(),
                Err(ConfigError::InvalidBootstrapNode(_))
            ));
        }
    }

    #[test]
    fn test_validate_rejects_zeroes() {
        let mut config = CrawlerConfig {
            max_workers_per_info_hash: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config.max_workers_per_info_hash = 1;
        config.tick_interval = Duration::ZERO;
        assert!(config.validate().is_err());

        config.tick_interval = Duration::from_millis(10);
        config.bootstrap_nodes.clear();
        assert!(config.validate().is_err());
    }
}

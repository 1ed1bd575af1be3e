use super::dispatcher::{DhtHandler, Dispatcher};
use super::error::DhtError;
use super::message::TransactionId;
use super::node::{Node, NodeId};
use super::routing::RoutingTable;
use super::rpc::{Rpc, RpcEvent};
use crate::bencode::decode;
use crate::config::{BootstrapNode, CrawlerConfig};
use crate::constants::BOOTSTRAP_RESOLVE_TIMEOUT;
use crate::metadata::{MetadataFetcher, MetadataResult, PeerWorker, Worker};
use crate::metainfo::InfoHash;
use crate::storage::TorrentStore;
use bytes::Bytes;
use futures::future::join_all;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, error, info, trace, warn};

/// Stops a running [`Crawler`] from another task.
#[derive(Debug, Clone)]
pub struct CrawlerHandle {
    running: Arc<AtomicBool>,
}

impl CrawlerHandle {
    /// Asks the crawler to stop. The loop exits at its next tick.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

/// The DHT crawl loop.
///
/// A single task owns the routing table, the RPC endpoint and the receiving
/// end of the metadata results, and multiplexes three event sources:
/// inbound datagrams, the crawl tick, and finished metadata downloads.
///
/// Every tick queries each node discovered since the previous tick with a
/// neighbour id, then starts a fresh batch. Announced info-hashes that the
/// store does not know yet are handed to the [`MetadataFetcher`]; metadata
/// it returns is decoded and stored off the loop.
///
/// # Examples
///
/// ```no_run
/// use dhtseek::config::CrawlerConfig;
/// use dhtseek::dht::Crawler;
/// use dhtseek::storage::MemoryStore;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let crawler = Crawler::bind(CrawlerConfig::default(), Arc::new(MemoryStore::new())).await?;
/// let handle = crawler.handle();
///
/// let task = tokio::spawn(crawler.run());
/// tokio::signal::ctrl_c().await?;
/// handle.stop();
/// task.await??;
/// # Ok(())
/// # }
/// ```
pub struct Crawler<S: TorrentStore, W: Worker = PeerWorker> {
    local: Node,
    routing_table: RoutingTable,
    rpc: Rpc,
    dispatcher: Dispatcher,
    fetcher: MetadataFetcher<W>,
    results: mpsc::UnboundedReceiver<MetadataResult>,
    store: Arc<S>,
    config: CrawlerConfig,
    running: Arc<AtomicBool>,
    bootstrap_addrs: Vec<SocketAddr>,
}

impl<S: TorrentStore> Crawler<S, PeerWorker> {
    /// Binds the DHT endpoint and resolves the bootstrap routers.
    pub async fn bind(config: CrawlerConfig, store: Arc<S>) -> Result<Self, DhtError> {
        let worker = PeerWorker::new(config.metadata_fetch_timeout);
        Self::with_worker(config, store, worker).await
    }
}

impl<S: TorrentStore, W: Worker> Crawler<S, W> {
    /// Like [`bind`](Crawler::bind), with a custom metadata worker.
    pub async fn with_worker(config: CrawlerConfig, store: Arc<S>, worker: W) -> Result<Self, DhtError> {
        config.validate()?;

        let rpc = Rpc::bind(config.bind).await?;
        let local = Node::generate(rpc.local_addr()?);
        info!("DHT crawler bound to {} with id {}", local.addr, local.id);

        let bootstrap_addrs =
            resolve_bootstrap(&config.bootstrap_nodes, local.addr, BOOTSTRAP_RESOLVE_TIMEOUT).await;
        if bootstrap_addrs.is_empty() {
            warn!("no bootstrap node resolved, retrying on the first tick");
        }

        let (fetcher, results) = MetadataFetcher::new(worker, config.max_workers_per_info_hash);
        let running = Arc::new(AtomicBool::new(true));

        Ok(Self {
            local,
            routing_table: RoutingTable::new(config.max_neighbours),
            rpc,
            dispatcher: Dispatcher::new(Arc::clone(&running)),
            fetcher,
            results,
            store,
            config,
            running,
            bootstrap_addrs,
        })
    }

    pub fn handle(&self) -> CrawlerHandle {
        CrawlerHandle {
            running: Arc::clone(&self.running),
        }
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local.addr
    }

    pub fn node_id(&self) -> &NodeId {
        &self.local.id
    }

    pub fn routing_table(&self) -> &RoutingTable {
        &self.routing_table
    }

    /// Runs until [`CrawlerHandle::stop`] is called or the socket fails.
    ///
    /// Live metadata workers are aborted on exit.
    pub async fn run(mut self) -> Result<(), DhtError> {
        let mut tick = interval(self.config.tick_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let dispatcher = self.dispatcher.clone();

        let result = loop {
            tokio::select! {
                event = self.rpc.next_event() => match event {
                    Ok(RpcEvent::Message { message, from }) => {
                        dispatcher.dispatch(&message, from, &mut self);
                    }
                    Ok(RpcEvent::BandwidthExhausted { dropped }) => self.on_bandwidth_exhausted(dropped),
                    Err(e) => {
                        error!("DHT socket failed: {}", e);
                        break Err(e);
                    }
                },
                _ = tick.tick() => {
                    if !self.running.load(Ordering::Acquire) {
                        break Ok(());
                    }
                    self.on_tick().await;
                }
                Some((info_hash, metadata)) = self.results.recv() => {
                    self.on_metadata_result(info_hash, metadata);
                }
            }
        };

        self.fetcher.shutdown();
        info!("DHT crawler on {} stopped", self.local.addr);
        result
    }

    async fn on_tick(&mut self) {
        if self.routing_table.is_empty() {
            self.bootstrap().await;
        }

        let nodes = self.routing_table.drain();
        for node in &nodes {
            let id = NodeId::neighbour(node.id.as_bytes(), &self.local.id);
            self.rpc.find_node(&id, node.addr);
        }

        self.routing_table.grow();
        trace!(
            "queried {} nodes, table capacity now {}",
            nodes.len(),
            self.routing_table.max_size()
        );
    }

    async fn bootstrap(&mut self) {
        if self.bootstrap_addrs.is_empty() {
            // never block the loop for longer than one tick
            let limit = BOOTSTRAP_RESOLVE_TIMEOUT.min(self.config.tick_interval);
            self.bootstrap_addrs =
                resolve_bootstrap(&self.config.bootstrap_nodes, self.local.addr, limit).await;
        }

        debug!("bootstrapping from {} routers", self.bootstrap_addrs.len());
        for addr in &self.bootstrap_addrs {
            self.rpc.find_node(&self.local.id, *addr);
        }
    }

    pub(super) fn on_bandwidth_exhausted(&mut self, dropped: usize) {
        if self.routing_table.back_off() {
            debug!(
                "{} datagrams dropped, table capacity lowered to {}",
                dropped,
                self.routing_table.max_size()
            );
        } else {
            warn!(
                "local network is saturated at table capacity {}; consider raising the socket buffer limits",
                self.routing_table.max_size()
            );
        }
    }

    fn on_metadata_result(&self, info_hash: InfoHash, metadata: Bytes) {
        let metadata = match decode(&metadata) {
            Ok(value) => value,
            Err(e) => {
                debug!("metadata for {} is not valid bencode: {}", info_hash, e);
                return;
            }
        };

        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || match store.store_metadata(&info_hash, &metadata) {
            Ok(torrent) => info!(
                "stored {} ({} files, {} bytes) {}",
                torrent.name,
                torrent.files.len(),
                torrent.total_length,
                info_hash
            ),
            Err(e) => debug!("could not store metadata for {}: {}", info_hash, e),
        });
    }
}

impl<S: TorrentStore, W: Worker> DhtHandler for Crawler<S, W> {
    fn on_find_node(&mut self, nodes: Vec<Node>) {
        for node in nodes {
            if node.id == self.local.id || !node.is_valid() {
                continue;
            }
            if !self.routing_table.add(node) {
                break;
            }
        }
    }

    fn on_get_peers(&mut self, transaction_id: TransactionId, info_hash: InfoHash, from: SocketAddr) {
        self.rpc
            .respond_get_peers(transaction_id, &info_hash, &self.local.id, from);
    }

    fn on_announce_peer(
        &mut self,
        transaction_id: TransactionId,
        sender_id: NodeId,
        info_hash: InfoHash,
        peer_addr: Option<SocketAddr>,
        from: SocketAddr,
    ) {
        let id = NodeId::neighbour(sender_id.as_bytes(), &self.local.id);
        self.rpc.respond_announce_peer(transaction_id, &id, from);

        let Some(peer_addr) = peer_addr else {
            trace!("{} announced {} with an unusable port", from, info_hash);
            return;
        };
        if self.store.exists(&info_hash) {
            return;
        }
        if self
            .fetcher
            .fetch(info_hash, peer_addr, self.config.max_metadata_size)
        {
            trace!("fetching metadata of {} from {}", info_hash, peer_addr);
        }
    }
}

/// Resolves every router concurrently, keeping addresses of the local family.
async fn resolve_bootstrap(
    nodes: &[BootstrapNode],
    local: SocketAddr,
    limit: Duration,
) -> Vec<SocketAddr> {
    let lookups = nodes.iter().map(|node| async move {
        match timeout(limit, tokio::net::lookup_host((node.host.as_str(), node.port))).await {
            Ok(Ok(addrs)) => addrs
                .filter(|addr| addr.is_ipv4() == local.is_ipv4())
                .collect(),
            Ok(Err(e)) => {
                warn!("failed to resolve bootstrap node {}: {}", node, e);
                Vec::new()
            }
            Err(_) => {
                warn!("resolving bootstrap node {} timed out", node);
                Vec::new()
            }
        }
    });

    join_all(lookups).await.into_iter().flatten().collect()
}

use super::session::fetch_metadata;
use crate::metainfo::InfoHash;
use bytes::Bytes;
use futures::future::BoxFuture;
use futures::FutureExt as _;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::trace;

/// Metadata obtained for an info-hash.
pub type MetadataResult = (InfoHash, Bytes);

/// Something that tries to obtain metadata from one peer.
///
/// The future resolves to `None` on any failure. It may be dropped at any
/// await point when a sibling worker wins.
pub trait Worker: Send + Sync + 'static {
    fn fetch(
        &self,
        info_hash: InfoHash,
        peer_addr: SocketAddr,
        max_metadata_size: usize,
    ) -> BoxFuture<'static, Option<Bytes>>;
}

/// Fetches over the peer wire protocol with an overall timeout per peer.
#[derive(Debug, Clone)]
pub struct PeerWorker {
    timeout: Duration,
}

impl PeerWorker {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Worker for PeerWorker {
    fn fetch(
        &self,
        info_hash: InfoHash,
        peer_addr: SocketAddr,
        max_metadata_size: usize,
    ) -> BoxFuture<'static, Option<Bytes>> {
        fetch_metadata(info_hash, peer_addr, max_metadata_size, self.timeout).boxed()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupState {
    /// Workers are running and no metadata has arrived yet.
    Pending,
    /// A worker produced metadata; siblings were cancelled.
    Fulfilled,
    /// Every admitted worker finished without metadata.
    Exhausted,
}

/// Workers sharing one info-hash.
#[derive(Debug)]
struct FetchGroup {
    state: GroupState,
    workers: Vec<(u64, AbortHandle)>,
}

impl FetchGroup {
    fn new() -> Self {
        Self {
            state: GroupState::Pending,
            workers: Vec::new(),
        }
    }

    fn live(&self) -> usize {
        self.workers.len()
    }

    /// Records a finished worker and returns the group's new state.
    fn finish(&mut self, worker_id: u64, found: bool) -> GroupState {
        self.workers.retain(|(id, _)| *id != worker_id);

        if found {
            self.state = GroupState::Fulfilled;
            for (_, handle) in self.workers.drain(..) {
                handle.abort();
            }
        } else if self.workers.is_empty() {
            self.state = GroupState::Exhausted;
        }
        self.state
    }
}

struct Inner<W> {
    worker: W,
    max_workers: usize,
    next_worker_id: AtomicU64,
    groups: Mutex<HashMap<InfoHash, FetchGroup>>,
    results: mpsc::UnboundedSender<MetadataResult>,
}

/// Bounded fan-out of metadata workers per info-hash.
///
/// Each info-hash gets a fetch group on its first [`fetch`](Self::fetch).
/// A group runs at most `max_workers` workers at once; further calls are
/// dropped, not queued. The first worker to return metadata wins: its
/// siblings are aborted, the group is torn down, and the metadata is sent
/// once on the results channel. A group whose workers all fail is torn
/// down silently.
pub struct MetadataFetcher<W: Worker = PeerWorker> {
    inner: Arc<Inner<W>>,
}

impl<W: Worker> Clone for MetadataFetcher<W> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<W: Worker> MetadataFetcher<W> {
    /// Creates a fetcher and the channel its results arrive on.
    pub fn new(worker: W, max_workers: usize) -> (Self, mpsc::UnboundedReceiver<MetadataResult>) {
        let (results, rx) = mpsc::unbounded_channel();
        let fetcher = Self {
            inner: Arc::new(Inner {
                worker,
                max_workers,
                next_worker_id: AtomicU64::new(0),
                groups: Mutex::new(HashMap::new()),
                results,
            }),
        };
        (fetcher, rx)
    }

    /// Starts a worker for `info_hash` against `peer_addr` if the group has room.
    ///
    /// Must be called from within a tokio runtime. Returns whether a worker
    /// was started.
    pub fn fetch(&self, info_hash: InfoHash, peer_addr: SocketAddr, max_metadata_size: usize) -> bool {
        let mut groups = self.inner.groups.lock();
        let group = groups.entry(info_hash).or_insert_with(FetchGroup::new);

        if group.state != GroupState::Pending || group.live() >= self.inner.max_workers {
            trace!("dropping fetch of {} from {}", info_hash, peer_addr);
            return false;
        }

        let worker_id = self.inner.next_worker_id.fetch_add(1, Ordering::Relaxed);
        let work = self.inner.worker.fetch(info_hash, peer_addr, max_metadata_size);
        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            let result = work.await;
            inner.on_worker_done(info_hash, worker_id, result);
        });

        group.workers.push((worker_id, handle.abort_handle()));
        true
    }

    /// Number of workers currently running for `info_hash`.
    pub fn live_workers(&self, info_hash: &InfoHash) -> usize {
        self.inner
            .groups
            .lock()
            .get(info_hash)
            .map_or(0, FetchGroup::live)
    }

    /// Number of info-hashes with running workers.
    pub fn group_count(&self) -> usize {
        self.inner.groups.lock().len()
    }

    /// Aborts every running worker and forgets all groups.
    pub fn shutdown(&self) {
        let groups = std::mem::take(&mut *self.inner.groups.lock());
        for (_, group) in groups {
            for (_, handle) in group.workers {
                handle.abort();
            }
        }
    }
}

impl<W> Inner<W> {
    fn on_worker_done(&self, info_hash: InfoHash, worker_id: u64, result: Option<Bytes>) {
        let mut groups = self.groups.lock();
        let Some(group) = groups.get_mut(&info_hash) else {
            return;
        };
        // a worker that finished just as a sibling won
        if !group.workers.iter().any(|(id, _)| *id == worker_id) {
            return;
        }

        match group.finish(worker_id, result.is_some()) {
            GroupState::Pending => {}
            GroupState::Exhausted => {
                trace!("no peer delivered metadata for {}", info_hash);
                groups.remove(&info_hash);
            }
            GroupState::Fulfilled => {
                groups.remove(&info_hash);
                if let Some(metadata) = result {
                    let _ = self.results.send((info_hash, metadata));
                }
            }
        }
    }
}

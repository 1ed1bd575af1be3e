use super::*;
use crate::bencode::{encode, Value};
use crate::metainfo::InfoHash;
use crate::peer::{ExtensionHandshake, Handshake, MetadataMessage, PeerError, PeerId, PeerMessage};
use bytes::Bytes;
use futures::future::BoxFuture;
use futures::FutureExt as _;
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

const MAX_SIZE: usize = 10_000_000;

fn sample_metadata(pieces_len: usize) -> Bytes {
    let info = Value::dict([
        (&b"length"[..], Value::Integer(1 << 20)),
        (b"name", Value::string("sample.bin")),
        (b"piece length", Value::Integer(16384)),
        (b"pieces", Value::Bytes(Bytes::from(vec![0x5A; pieces_len]))),
    ]);
    Bytes::from(encode(&info).unwrap())
}

fn peer_addr() -> SocketAddr {
    "93.184.216.34:6881".parse().unwrap()
}

// ---------------------------------------------------------------------------
// Fetch groups
// ---------------------------------------------------------------------------

/// Increments a counter when a worker future is dropped before finishing.
struct CancelGuard {
    cancelled: Arc<AtomicUsize>,
    armed: bool,
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        if self.armed {
            self.cancelled.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[derive(Default)]
struct MockWorker {
    started: Arc<AtomicUsize>,
    cancelled: Arc<AtomicUsize>,
    controls: Arc<Mutex<Vec<oneshot::Sender<Option<Bytes>>>>>,
}

impl Worker for MockWorker {
    fn fetch(
        &self,
        _info_hash: InfoHash,
        _peer_addr: SocketAddr,
        _max_metadata_size: usize,
    ) -> BoxFuture<'static, Option<Bytes>> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.controls.lock().push(tx);

        let guard = CancelGuard {
            cancelled: Arc::clone(&self.cancelled),
            armed: true,
        };
        async move {
            // bind the whole guard so it lives as long as the future
            let mut guard = guard;
            let result = rx.await.ok().flatten();
            guard.armed = false;
            result
        }
        .boxed()
    }
}

fn mock_fetcher(
    max_workers: usize,
) -> (
    MetadataFetcher<MockWorker>,
    tokio::sync::mpsc::UnboundedReceiver<MetadataResult>,
    Arc<AtomicUsize>,
    Arc<AtomicUsize>,
    Arc<Mutex<Vec<oneshot::Sender<Option<Bytes>>>>>,
) {
    let worker = MockWorker::default();
    let started = Arc::clone(&worker.started);
    let cancelled = Arc::clone(&worker.cancelled);
    let controls = Arc::clone(&worker.controls);
    let (fetcher, rx) = MetadataFetcher::new(worker, max_workers);
    (fetcher, rx, started, cancelled, controls)
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("condition not reached");
}

#[tokio::test]
async fn test_fourth_fetch_is_dropped() {
    let (fetcher, _rx, started, _, _) = mock_fetcher(3);
    let info_hash = InfoHash([1u8; 20]);

    assert!(fetcher.fetch(info_hash, peer_addr(), MAX_SIZE));
    assert!(fetcher.fetch(info_hash, peer_addr(), MAX_SIZE));
    assert!(fetcher.fetch(info_hash, peer_addr(), MAX_SIZE));
    assert!(!fetcher.fetch(info_hash, peer_addr(), MAX_SIZE));

    assert_eq!(started.load(Ordering::SeqCst), 3);
    assert_eq!(fetcher.live_workers(&info_hash), 3);

    // other info-hashes have their own cap
    assert!(fetcher.fetch(InfoHash([2u8; 20]), peer_addr(), MAX_SIZE));
    assert_eq!(fetcher.group_count(), 2);
}

#[tokio::test]
async fn test_first_result_wins_and_cancels_siblings() {
    let (fetcher, mut rx, _, cancelled, controls) = mock_fetcher(3);
    let info_hash = InfoHash([7u8; 20]);

    for _ in 0..3 {
        assert!(fetcher.fetch(info_hash, peer_addr(), MAX_SIZE));
    }
    tokio::task::yield_now().await;

    let winner = controls.lock().remove(1);
    winner.send(Some(Bytes::from_static(b"metadata"))).unwrap();

    let (hash, metadata) = rx.recv().await.unwrap();
    assert_eq!(hash, info_hash);
    assert_eq!(metadata.as_ref(), b"metadata");

    wait_until(|| cancelled.load(Ordering::SeqCst) == 2).await;
    assert_eq!(fetcher.group_count(), 0);

    // the losers can no longer report anything
    for tx in controls.lock().drain(..) {
        let _ = tx.send(Some(Bytes::from_static(b"late")));
    }
    tokio::task::yield_now().await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_exhausted_group_is_torn_down_without_result() {
    let (fetcher, mut rx, _, cancelled, controls) = mock_fetcher(3);
    let info_hash = InfoHash([3u8; 20]);

    assert!(fetcher.fetch(info_hash, peer_addr(), MAX_SIZE));
    assert!(fetcher.fetch(info_hash, peer_addr(), MAX_SIZE));
    tokio::task::yield_now().await;

    let first = controls.lock().remove(0);
    first.send(None).unwrap();
    wait_until(|| fetcher.live_workers(&info_hash) == 1).await;
    assert_eq!(fetcher.group_count(), 1);

    let second = controls.lock().remove(0);
    second.send(None).unwrap();
    wait_until(|| fetcher.group_count() == 0).await;

    assert!(rx.try_recv().is_err());
    assert_eq!(cancelled.load(Ordering::SeqCst), 0);

    // a later announcement starts a fresh group
    assert!(fetcher.fetch(info_hash, peer_addr(), MAX_SIZE));
    assert_eq!(fetcher.live_workers(&info_hash), 1);
}

#[tokio::test]
async fn test_shutdown_aborts_all_workers() {
    let (fetcher, _rx, _, cancelled, _controls) = mock_fetcher(3);

    for i in 0..4u8 {
        assert!(fetcher.fetch(InfoHash([i; 20]), peer_addr(), MAX_SIZE));
    }
    tokio::task::yield_now().await;

    fetcher.shutdown();
    assert_eq!(fetcher.group_count(), 0);
    wait_until(|| cancelled.load(Ordering::SeqCst) == 4).await;
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

#[test]
fn test_session_requests_every_piece() {
    let metadata = sample_metadata(40_000);
    let info_hash = InfoHash::from_metadata(&metadata);
    let mut session = MetadataSession::new(info_hash, peer_addr(), MAX_SIZE);

    let mut theirs = ExtensionHandshake::with_extensions(&[("ut_metadata", 3)]);
    theirs.metadata_size = Some(metadata.len() as i64);
    let requests = session
        .on_extension_handshake(&theirs.encode().unwrap())
        .unwrap();

    assert_eq!(requests.len(), metadata.len().div_ceil(16384));
    for (piece, request) in requests.iter().enumerate() {
        let PeerMessage::Extended { id, payload } = request else {
            panic!("expected an extended message");
        };
        assert_eq!(*id, 3);
        assert_eq!(
            MetadataMessage::decode(payload).unwrap(),
            MetadataMessage::request(piece as u32)
        );
    }

    // a repeated handshake is ignored
    assert!(session
        .on_extension_handshake(&theirs.encode().unwrap())
        .unwrap()
        .is_empty());
}

#[test]
fn test_session_ignores_handshake_without_metadata() {
    let mut session = MetadataSession::new(InfoHash([1u8; 20]), peer_addr(), MAX_SIZE);

    let no_size = ExtensionHandshake::with_extensions(&[("ut_metadata", 3)]);
    assert!(session
        .on_extension_handshake(&no_size.encode().unwrap())
        .unwrap()
        .is_empty());

    let mut no_extension = ExtensionHandshake::new();
    no_extension.metadata_size = Some(100);
    assert!(session
        .on_extension_handshake(&no_extension.encode().unwrap())
        .unwrap()
        .is_empty());

    assert!(session.on_extension_handshake(b"garbage").unwrap().is_empty());
}

#[test]
fn test_session_rejects_bad_metadata_size() {
    for size in [0, -5, 1_000] {
        let mut session = MetadataSession::new(InfoHash([1u8; 20]), peer_addr(), 1_000);
        let mut theirs = ExtensionHandshake::with_extensions(&[("ut_metadata", 2)]);
        theirs.metadata_size = Some(size);

        assert!(matches!(
            session.on_extension_handshake(&theirs.encode().unwrap()),
            Err(PeerError::InvalidMetadata(_))
        ));
    }
}

#[test]
fn test_session_hash_mismatch_keeps_waiting() {
    let metadata = sample_metadata(100);
    let info_hash = InfoHash::from_metadata(&metadata);
    let mut session = MetadataSession::new(info_hash, peer_addr(), MAX_SIZE);

    let mut theirs = ExtensionHandshake::with_extensions(&[("ut_metadata", 3)]);
    theirs.metadata_size = Some(metadata.len() as i64);
    session
        .on_extension_handshake(&theirs.encode().unwrap())
        .unwrap();

    let mut corrupt = metadata.to_vec();
    corrupt[10] ^= 0xFF;
    let bad = MetadataMessage::data(0, metadata.len() as i64, Bytes::from(corrupt))
        .encode()
        .unwrap();
    assert_eq!(session.on_metadata_message(&bad).unwrap(), None);

    let good = MetadataMessage::data(0, metadata.len() as i64, metadata.clone())
        .encode()
        .unwrap();
    assert_eq!(session.on_metadata_message(&good).unwrap(), Some(metadata));
}

#[test]
fn test_session_rejects_misplaced_pieces() {
    let metadata = sample_metadata(100);
    let mut session =
        MetadataSession::new(InfoHash::from_metadata(&metadata), peer_addr(), MAX_SIZE);

    let mut theirs = ExtensionHandshake::with_extensions(&[("ut_metadata", 3)]);
    theirs.metadata_size = Some(metadata.len() as i64);
    session
        .on_extension_handshake(&theirs.encode().unwrap())
        .unwrap();

    let out_of_range = MetadataMessage::data(1, 0, metadata.clone()).encode().unwrap();
    assert!(matches!(
        session.on_metadata_message(&out_of_range),
        Err(PeerError::InvalidMetadata(_))
    ));

    let short = MetadataMessage::data(0, 0, metadata.slice(1..)).encode().unwrap();
    assert!(matches!(
        session.on_metadata_message(&short),
        Err(PeerError::InvalidMetadata(_))
    ));

    let reject = MetadataMessage::reject(0).encode().unwrap();
    assert_eq!(session.on_metadata_message(&reject).unwrap(), None);
}

async fn read_frame(stream: &mut TcpStream) -> Bytes {
    let len = stream.read_u32().await.unwrap() as usize;
    let mut body = vec![0u8; len];
    stream.read_exact(&mut body).await.unwrap();
    Bytes::from(body)
}

/// Serves `metadata` like a well-behaved peer that numbers ut_metadata 3.
async fn serve_metadata(listener: TcpListener, handshake_hash: InfoHash, metadata: Bytes) {
    let (mut stream, _) = listener.accept().await.unwrap();

    let mut handshake = [0u8; 68];
    stream.read_exact(&mut handshake).await.unwrap();
    assert_eq!(handshake[25] & 0x10, 0x10);
    stream
        .write_all(&Handshake::new(handshake_hash, PeerId::generate()).encode())
        .await
        .unwrap();

    let PeerMessage::Extended { id: 0, payload } = PeerMessage::decode(read_frame(&mut stream).await).unwrap() else {
        panic!("expected extension handshake");
    };
    let ours = ExtensionHandshake::decode(&payload).unwrap();
    let our_id = ours.get_extension_id("ut_metadata").unwrap();

    let mut theirs = ExtensionHandshake::with_extensions(&[("ut_metadata", 3)]);
    theirs.metadata_size = Some(metadata.len() as i64);
    // unrelated traffic first
    stream.write_all(&[0, 0, 0, 1, 1]).await.unwrap();
    stream
        .write_all(
            &PeerMessage::Extended {
                id: 0,
                payload: theirs.encode().unwrap(),
            }
            .encode(),
        )
        .await
        .unwrap();

    let pieces = metadata.len().div_ceil(16384);
    for _ in 0..pieces {
        let PeerMessage::Extended { id: 3, payload } = PeerMessage::decode(read_frame(&mut stream).await).unwrap() else {
            panic!("expected ut_metadata request");
        };
        let request = MetadataMessage::decode(&payload).unwrap();
        let start = request.piece as usize * 16384;
        let end = (start + 16384).min(metadata.len());
        let data = MetadataMessage::data(request.piece, metadata.len() as i64, metadata.slice(start..end));
        let message = PeerMessage::Extended {
            id: our_id,
            payload: data.encode().unwrap(),
        };
        stream.write_all(&message.encode()).await.unwrap();
    }

    // wait for the fetcher to hang up
    let mut rest = Vec::new();
    let _ = stream.read_to_end(&mut rest).await;
}

#[tokio::test]
async fn test_fetch_metadata_from_peer() {
    let metadata = sample_metadata(40_000);
    let info_hash = InfoHash::from_metadata(&metadata);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let peer = tokio::spawn(serve_metadata(listener, info_hash, metadata.clone()));

    let fetched = fetch_metadata(info_hash, addr, MAX_SIZE, Duration::from_secs(10)).await;
    assert_eq!(fetched, Some(metadata));
    peer.await.unwrap();
}

#[tokio::test]
async fn test_session_wrong_info_hash_handshake() {
    let metadata = sample_metadata(10);
    let info_hash = InfoHash::from_metadata(&metadata);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let peer = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut handshake = [0u8; 68];
        stream.read_exact(&mut handshake).await.unwrap();
        stream
            .write_all(&Handshake::new(InfoHash([0xEE; 20]), PeerId::generate()).encode())
            .await
            .unwrap();
        stream
    });

    let result = MetadataSession::new(info_hash, addr, MAX_SIZE).run().await;
    assert!(matches!(result, Err(PeerError::InvalidHandshake)));
    drop(peer.await.unwrap());
}

#[tokio::test]
async fn test_fetch_metadata_refused_and_timeout() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let closed = listener.local_addr().unwrap();
    drop(listener);
    let info_hash = InfoHash([4u8; 20]);
    assert_eq!(
        fetch_metadata(info_hash, closed, MAX_SIZE, Duration::from_secs(5)).await,
        None
    );

    let silent = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = silent.local_addr().unwrap();
    let started = std::time::Instant::now();
    assert_eq!(
        fetch_metadata(info_hash, addr, MAX_SIZE, Duration::from_millis(200)).await,
        None
    );
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_peer_worker_through_fetcher() {
    let metadata = sample_metadata(1_000);
    let info_hash = InfoHash::from_metadata(&metadata);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(serve_metadata(listener, info_hash, metadata.clone()));

    let (fetcher, mut rx) = MetadataFetcher::new(PeerWorker::new(Duration::from_secs(10)), 3);
    assert!(fetcher.fetch(info_hash, addr, MAX_SIZE));

    let (hash, fetched) = rx.recv().await.unwrap();
    assert_eq!(hash, info_hash);
    assert_eq!(fetched, metadata);
}

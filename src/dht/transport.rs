use super::error::DhtError;
use crate::constants::MAX_DATAGRAM_SIZE;
use bytes::Bytes;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::net::UdpSocket;
use tracing::trace;

#[cfg(target_os = "linux")]
const ENOBUFS: i32 = 105;
#[cfg(any(target_os = "macos", target_os = "ios", target_os = "freebsd"))]
const ENOBUFS: i32 = 55;
#[cfg(windows)]
const ENOBUFS: i32 = 10055;
#[cfg(not(any(
    target_os = "linux",
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    windows
)))]
const ENOBUFS: i32 = -1;

/// Something the transport has to tell its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A datagram arrived.
    Datagram { data: Bytes, from: SocketAddr },
    /// Outbound datagrams were dropped because the local send queue is full.
    /// Consecutive drops are reported once.
    BandwidthExhausted { dropped: usize },
}

/// A single UDP endpoint with fire-and-forget sends.
///
/// Sends never wait: a datagram that cannot be queued immediately is dropped
/// and remembered, and the next call to [`next_event`](Self::next_event)
/// reports [`TransportEvent::BandwidthExhausted`] before reading further.
pub struct UdpTransport {
    socket: UdpSocket,
    dropped: AtomicUsize,
    buf: Vec<u8>,
}

impl UdpTransport {
    pub async fn bind(addr: SocketAddr) -> Result<Self, DhtError> {
        let socket = UdpSocket::bind(addr).await?;
        // try_send_to only attempts the send once the reactor has seen the
        // socket writable
        socket.writable().await?;
        Ok(Self {
            socket,
            dropped: AtomicUsize::new(0),
            buf: vec![0u8; MAX_DATAGRAM_SIZE],
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, DhtError> {
        Ok(self.socket.local_addr()?)
    }

    /// Queues a datagram without waiting.
    ///
    /// Local congestion is recorded rather than returned; any other failure
    /// is logged and the datagram is lost, as UDP would lose it anyway.
    pub fn send_to(&self, data: &[u8], addr: SocketAddr) {
        match self.socket.try_send_to(data, addr) {
            Ok(_) => {}
            Err(e) if is_bandwidth_exhausted(&e) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                trace!("send to {} failed: {}", addr, e);
            }
        }
    }

    /// Waits for the next datagram or reports pending congestion.
    pub async fn next_event(&mut self) -> Result<TransportEvent, DhtError> {
        loop {
            let dropped = self.dropped.swap(0, Ordering::Relaxed);
            if dropped > 0 {
                return Ok(TransportEvent::BandwidthExhausted { dropped });
            }

            match self.socket.recv_from(&mut self.buf).await {
                Ok((n, from)) => {
                    return Ok(TransportEvent::Datagram {
                        data: Bytes::copy_from_slice(&self.buf[..n]),
                        from,
                    });
                }
                Err(e) if is_bandwidth_exhausted(&e) => {
                    return Ok(TransportEvent::BandwidthExhausted { dropped: 0 });
                }
                // ICMP errors from earlier sends surface here on some platforms
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionRefused
                    ) =>
                {
                    trace!("ignoring receive error: {}", e);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

/// Whether a socket error means the local outbound queue is saturated.
pub fn is_bandwidth_exhausted(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::PermissionDenied | io::ErrorKind::WouldBlock
    ) || err.raw_os_error() == Some(ENOBUFS)
}

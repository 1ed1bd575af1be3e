use super::error::PeerError;
use super::message::{Handshake, PeerMessage};
use crate::constants::{HANDSHAKE_LEN, MAX_FRAME_SIZE};
use crate::metainfo::InfoHash;
use bytes::BytesMut;
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Framed peer wire connection.
///
/// No per-operation timeouts: callers bound the whole exchange.
pub struct PeerTransport {
    stream: TcpStream,
    read_buf: BytesMut,
}

impl PeerTransport {
    pub async fn connect(addr: SocketAddr) -> Result<Self, PeerError> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self::new(stream))
    }

    pub fn new(stream: TcpStream) -> Self {
        Self {
            stream,
            read_buf: BytesMut::with_capacity(32 * 1024),
        }
    }

    pub async fn send_handshake(&mut self, handshake: &Handshake) -> Result<(), PeerError> {
        self.stream.write_all(&handshake.encode()).await?;
        Ok(())
    }

    /// Reads exactly one handshake and validates it against `info_hash`.
    pub async fn receive_handshake(&mut self, info_hash: &InfoHash) -> Result<Handshake, PeerError> {
        self.fill(HANDSHAKE_LEN).await?;
        let data = self.read_buf.split_to(HANDSHAKE_LEN);
        Handshake::validate(&data, info_hash)
    }

    pub async fn send_message(&mut self, message: &PeerMessage) -> Result<(), PeerError> {
        self.stream.write_all(&message.encode()).await?;
        Ok(())
    }

    pub async fn receive_message(&mut self) -> Result<PeerMessage, PeerError> {
        self.fill(4).await?;

        let length = u32::from_be_bytes([
            self.read_buf[0],
            self.read_buf[1],
            self.read_buf[2],
            self.read_buf[3],
        ]) as usize;

        if length > MAX_FRAME_SIZE {
            return Err(PeerError::InvalidMessage(format!(
                "message too large: {}",
                length
            )));
        }

        self.fill(4 + length).await?;
        let mut frame = self.read_buf.split_to(4 + length);
        let body = frame.split_off(4);
        PeerMessage::decode(body.freeze())
    }

    pub async fn shutdown(&mut self) -> Result<(), PeerError> {
        self.stream.shutdown().await?;
        Ok(())
    }

    async fn fill(&mut self, len: usize) -> Result<(), PeerError> {
        while self.read_buf.len() < len {
            let n = self.stream.read_buf(&mut self.read_buf).await?;
            if n == 0 {
                return Err(PeerError::ConnectionClosed);
            }
        }
        Ok(())
    }
}

use thiserror::Error;

/// Errors that can occur while talking to a peer.
///
/// None of these outlive a single metadata session.
#[derive(Debug, Error)]
pub enum PeerError {
    /// Network I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer's handshake has the wrong protocol, the wrong info hash, or
    /// no extension protocol support.
    #[error("invalid handshake")]
    InvalidHandshake,

    /// The peer advertised or sent metadata we cannot accept.
    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),

    /// Received a malformed protocol message.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// The connection was closed by the peer.
    #[error("connection closed")]
    ConnectionClosed,

    /// The session ran out of time.
    #[error("timeout")]
    Timeout,

    /// Extension protocol error.
    #[error("extension error: {0}")]
    Extension(String),

    /// Error decoding bencode in extension messages.
    #[error("bencode error: {0}")]
    Bencode(#[from] crate::bencode::BencodeError),
}

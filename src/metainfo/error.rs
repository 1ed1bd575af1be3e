use thiserror::Error;

use crate::bencode::BencodeError;

/// Errors that can occur when interpreting fetched torrent metadata.
#[derive(Debug, Error)]
pub enum MetainfoError {
    /// The metadata is not valid bencode.
    #[error("bencode error: {0}")]
    Bencode(#[from] BencodeError),

    /// A required field is missing from the info dictionary.
    #[error("missing field: {0}")]
    MissingField(&'static str),

    /// A field has an invalid value or type.
    #[error("invalid field: {0}")]
    InvalidField(&'static str),

    /// The info hash is not 20 bytes (or 40 hex characters).
    #[error("invalid info hash length")]
    InvalidInfoHashLength,
}

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BittorrentError {
    #[error("Bencode parsing error: {0}")]
    BencodeError(String),

    #[error("Invalid torrent file: {0}")]
    InvalidTorrent(String),

    #[error("Piece length must be non-zero")]
    ZeroPieceLength,

    #[error("I/O error on {}: {source}", path.display())]
    FileError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid hash: {0}")]
    InvalidHash(String),

    #[error("Message too long: {length} bytes (max {max})")]
    MessageTooLong { length: u32, max: u32 },

    #[error("Piece data longer than expected: {length} bytes (buffer capacity {capacity})")]
    PieceDataTooLong { length: usize, capacity: usize },

    #[error("Unknown message type: {0}")]
    UnknownMessageType(u8),

    #[error("Message of type {message_type} declared {length} bytes, too short for its payload")]
    MessageTooShort { message_type: u8, length: u32 },

    #[error("{0} unused bytes in message")]
    UnusedBytes(u32),

    #[error("Unexpected handshake protocol string: {0:?}")]
    ProtocolMismatch(Vec<u8>),

    #[error("Handshake send queue rejected a write: {0}")]
    HandshakeQueue(String),

    #[error("Info hash mismatch: expected {expected}, peer sent {actual}")]
    InfoHashMismatch { expected: String, actual: String },

    #[error("Invalid magnet link: {0}")]
    InvalidMagnet(String),

    #[error("Peer connection error: {0}")]
    PeerError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    UrlParseError(String),
}

impl From<url::ParseError> for BittorrentError {
    fn from(err: url::ParseError) -> Self {
        BittorrentError::UrlParseError(err.to_string())
    }
}

impl BittorrentError {
    /// The peer sent a frame that cannot be part of a well-formed stream.
    /// The connection should be dropped.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            BittorrentError::UnknownMessageType(_)
                | BittorrentError::MessageTooShort { .. }
                | BittorrentError::UnusedBytes(_)
                | BittorrentError::ProtocolMismatch(_)
                | BittorrentError::InfoHashMismatch { .. }
        ) || self.is_resource_guard()
    }

    /// The peer asked us to allocate more than we are willing to.
    pub fn is_resource_guard(&self) -> bool {
        matches!(
            self,
            BittorrentError::MessageTooLong { .. } | BittorrentError::PieceDataTooLong { .. }
        )
    }

    /// Wraps an I/O error with the path of the file that produced it.
    pub fn file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BittorrentError::FileError {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, BittorrentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let too_long = BittorrentError::MessageTooLong { length: 10, max: 5 };
        assert!(too_long.is_resource_guard());
        assert!(too_long.is_protocol_violation());

        assert!(BittorrentError::UnusedBytes(3).is_protocol_violation());
        assert!(!BittorrentError::UnusedBytes(3).is_resource_guard());

        let io = BittorrentError::from(std::io::Error::from(std::io::ErrorKind::UnexpectedEof));
        assert!(!io.is_protocol_violation());
        assert!(!io.is_resource_guard());
    }

    #[test]
    fn test_file_error_names_path() {
        let err = BittorrentError::file(
            "/tmp/missing.bin",
            std::io::Error::from(std::io::ErrorKind::NotFound),
        );
        let msg = err.to_string();
        assert!(msg.starts_with("I/O error on /tmp/missing.bin"), "{}", msg);
        assert!(!msg.contains("reading"));
    }
}

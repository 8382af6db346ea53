//! Error types for the relay control plane

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub use crate::registry::{LaunchError, TerminationError};

/// Crate-level error type
#[derive(Debug, Error)]
pub enum Error {
    /// Control channel failure (dial, listen, accept, stream)
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Channel metadata could not be loaded
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// No channel in the catalog has a resolved media URL
    #[error("catalog has no channel with a media URL")]
    EmptyCatalog,

    /// External pipeline failed to start
    #[error("launch error: {0}")]
    Launch(#[from] LaunchError),

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Control channel errors
#[derive(Debug, Error)]
pub enum TransportError {
    /// Address could not be resolved
    #[error("invalid address {0}")]
    InvalidAddress(String),

    /// TLS / QUIC crypto setup failed
    #[error("TLS setup failed: {0}")]
    Tls(String),

    /// Listening endpoint could not be created
    #[error("listen failed: {0}")]
    Listen(String),

    /// Outgoing connection failed
    #[error("dial failed: {0}")]
    Dial(String),

    /// Incoming connection could not be completed
    #[error("accept failed: {0}")]
    Accept(String),

    /// Stream open, read or write failed
    #[error("stream failed: {0}")]
    Stream(String),

    /// Peer sent more than the receive bound allows
    #[error("message exceeds {limit} bytes")]
    MessageTooLarge { limit: usize },

    /// Payload is not a valid message
    #[error("malformed message: {0}")]
    Malformed(String),

    /// Request did not finish within the configured timeout
    #[error("request timed out")]
    Timeout,
}

/// Catalog loading errors
///
/// These are recovered by skipping the offending channel.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Metadata file could not be read
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Metadata file is not valid channel JSON
    #[error("cannot parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Channel has no resolved media URL
    #[error("channel {0} has no media URLs")]
    NoMediaUrls(String),

    /// Playlist document could not be interpreted
    #[error("playlist {path}: {reason}")]
    Playlist { path: PathBuf, reason: String },
}

/// Result type alias for crate operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_converts() {
        let err: Error = TransportError::MessageTooLarge { limit: 4096 }.into();
        assert!(matches!(
            err,
            Error::Transport(TransportError::MessageTooLarge { limit: 4096 })
        ));
        assert_eq!(
            err.to_string(),
            "transport error: message exceeds 4096 bytes"
        );
    }

    #[test]
    fn test_catalog_error_display() {
        let err = CatalogError::NoMediaUrls("NewsOne".into());
        assert_eq!(err.to_string(), "channel NewsOne has no media URLs");
    }
}

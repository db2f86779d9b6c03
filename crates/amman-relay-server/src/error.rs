//! Error types for the relay server.

use amman_relay_protocol::ProtocolError;
use amman_relay_transport::TransportError;

/// Errors that can occur while serving relay connections.
///
/// Only [`ServerError::Bind`] ever reaches the caller of the server; the
/// others end a single connection and are logged.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Sending or receiving on a persistent channel failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A reply could not be encoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The listener could not be bound.
    #[error("failed to bind relay to {addr}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// An HTTP connection failed.
    #[error("http connection failed: {0}")]
    Http(#[from] hyper::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_error_names_address() {
        let err = ServerError::Bind {
            addr: "127.0.0.1:50474".into(),
            source: std::io::Error::new(
                std::io::ErrorKind::AddrInUse,
                "in use",
            ),
        };
        assert!(err.to_string().contains("127.0.0.1:50474"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_from_transport_error() {
        let err: ServerError =
            TransportError::ConnectionClosed("gone".into()).into();
        assert!(matches!(err, ServerError::Transport(_)));
    }
}

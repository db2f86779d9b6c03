//! Unified error type for the relay crates.

use amman_relay_client::{RelayError, VersionGateError};
use amman_relay_protocol::ProtocolError;
use amman_relay_server::ServerError;
use amman_relay_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// Code that both runs a relay and talks to one can use `?` on either
/// side and get this single type back.
#[derive(Debug, thiserror::Error)]
pub enum RelayStackError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A client call failed.
    #[error(transparent)]
    Client(#[from] RelayError),

    /// The server could not start or a connection failed.
    #[error(transparent)]
    Server(#[from] ServerError),
}

impl From<VersionGateError> for RelayStackError {
    fn from(err: VersionGateError) -> Self {
        Self::Client(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let stack_err: RelayStackError = err.into();
        assert!(matches!(stack_err, RelayStackError::Transport(_)));
        assert!(stack_err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::InvalidMessage("bad".into());
        let stack_err: RelayStackError = err.into();
        assert!(matches!(stack_err, RelayStackError::Protocol(_)));
    }

    #[test]
    fn test_from_client_error_keeps_guidance() {
        let err = RelayError::Timeout {
            action: "fetch labels".into(),
        };
        let stack_err: RelayStackError = err.into();
        assert!(matches!(stack_err, RelayStackError::Client(_)));
        assert!(stack_err.to_string().contains("is the relay running?"));
    }

    #[test]
    fn test_version_gate_error_lands_in_client() {
        let err = VersionGateError::Unreachable("refused".into());
        let stack_err: RelayStackError = err.into();
        assert!(matches!(
            stack_err,
            RelayStackError::Client(RelayError::VersionGate(_))
        ));
    }
}

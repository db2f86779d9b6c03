//! Error types for the relay client.

use amman_relay_protocol::{MIN_RELAY_VERSION_REQUIRED, ProtocolError};
use amman_relay_transport::TransportError;

/// Appended to timeout errors: the usual cause is a relay that isn't up.
pub const RELAY_NOT_RUNNING_GUIDANCE: &str = "If not please start it as part \
of amman in a separate terminal via `amman start`.\n\
Make sure the relay is enabled in the amman config.\n\
Alternatively use a disconnected relay client when no relay is available.";

/// Errors surfaced to callers of the relay client.
///
/// Every failure a caller can see is one of these, carrying a readable
/// message. Nothing is swallowed except keypair decode failures, which
/// load as "no keypair".
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// No reply arrived before the call's deadline.
    #[error("Unable to {action}, is the relay running?\n{}", RELAY_NOT_RUNNING_GUIDANCE)]
    Timeout { action: String },

    /// The relay answered with an `{err}` envelope.
    #[error("{0}")]
    Server(String),

    /// The relay failed the version handshake. Sticky for the client.
    #[error(transparent)]
    VersionGate(#[from] VersionGateError),

    /// The connection failed while the call was outstanding.
    #[error("relay transport failed: {0}")]
    Transport(String),

    /// The connection is gone; no further calls can be made.
    #[error("relay connection is closed")]
    Closed,

    /// Opening the connection failed.
    #[error(transparent)]
    Connect(#[from] TransportError),

    /// A request or reply could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Why the version handshake rejected the relay.
///
/// `Clone` because the outcome of the one handshake is cached and handed
/// to every later caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VersionGateError {
    /// The relay is older than [`MIN_RELAY_VERSION_REQUIRED`], or replied in
    /// a shape only old relays use.
    #[error(
        "It appears you're using an outdated amman relay version {detected}\n\
         Please ensure you're running amman {} or newer",
        MIN_RELAY_VERSION_REQUIRED
    )]
    Outdated { detected: String },

    /// The relay answered the handshake with an error.
    #[error(
        "{err}\nEncountered error when trying to verify amman relay compatibility.\n\
         Please ensure you're running amman {} or newer",
        MIN_RELAY_VERSION_REQUIRED
    )]
    Incompatible { err: String },

    /// The handshake itself did not complete.
    #[error("unable to verify amman relay version: {0}")]
    Unreachable(String),
}

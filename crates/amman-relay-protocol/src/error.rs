//! Error types for the protocol layer.
//!
//! A `ProtocolError` always means the problem is in the shape of a
//! message: it could not be encoded, decoded, or its arguments did not
//! fit the operation. Networking and handler failures live elsewhere.

use crate::RequestKind;

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes or JSON).
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes or JSON into a Rust type).
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The event name is not part of the catalog.
    #[error("unknown event '{0}'")]
    UnknownEvent(String),

    /// A required positional argument was absent or `null`.
    #[error("{request} requires argument '{name}'")]
    MissingArgument {
        request: RequestKind,
        name: &'static str,
    },

    /// A positional argument was present but had the wrong shape.
    #[error("{request} received invalid argument '{name}': {source}")]
    InvalidArgument {
        request: RequestKind,
        name: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// A string is not a valid base58 account address.
    #[error("invalid address '{0}'")]
    InvalidAddress(String),

    /// The message decoded but violates protocol rules.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}

//! Wire protocol for the amman relay.
//!
//! This crate is the one canonical definition of what the relay client
//! and the relay server say to each other:
//!
//! - **Catalog** ([`RequestKind`], [`ResponseKind`], [`Request`]): the
//!   closed set of operations, each request paired with exactly one
//!   response (or acknowledgement) kind.
//! - **Envelope** ([`RelayReply`], [`VoidResult`], [`AckReply`]): the
//!   `{result}` xor `{err}` shape every reply takes.
//! - **Frame** ([`Frame`]): how a message travels on the persistent
//!   channel.
//! - **Routes** ([`Route`]): how requests map onto the stateless HTTP
//!   transport.
//! - **Version** ([`Version`]): the compatibility predicate the client
//!   checks before talking to a server.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): bytes in, bytes out.
//!
//! # Architecture
//!
//! ```text
//! Transport (bytes) → Protocol (Frame / Request / RelayReply) → Client | Router
//! ```
//!
//! Adding an operation means adding one `RequestKind`, one `ResponseKind`,
//! one payload type, one `Request` variant and (if it is reachable over
//! HTTP) one route. Every other place is an exhaustive `match` the
//! compiler will point at.

mod catalog;
mod codec;
mod envelope;
mod error;
mod frame;
mod routes;
mod types;
mod version;

pub use catalog::{Request, RequestKind, ResponseKind};
pub use codec::{Codec, JsonCodec};
pub use envelope::{AckReply, RelayReply, VOID_REPLY, VoidResult};
pub use error::ProtocolError;
pub use frame::Frame;
pub use routes::{RELAY_REST_PATH, RelayMethod, Route, strip_relay_prefix};
pub use types::{
    AccountSaveResult, AccountStatesResult, Address, AddressLabels,
    AddressLabelsResult, LoadKeypairResult, PersistedAccount,
    PersistedAccountInfo, RelayAccountState, SecretKeyBytes,
    SnapshotSaveResult, ValidatorPid,
};
pub use version::{MIN_RELAY_VERSION_REQUIRED, RELAY_VERSION, Version};

/// Default port the relay listens on, for both transports.
pub const RELAY_PORT: u16 = 50474;

/// Exit code the relay host uses after a successful kill request.
pub const KILL_AMMAN_EXIT_CODE: i32 = 111;

//! # amman-relay
//!
//! The request/response layer between a local-validator manager and the
//! tools that drive it.
//!
//! A relay implements [`RelayHandler`](prelude::RelayHandler) and is served
//! by a [`RelayServer`](prelude::RelayServer) over a WebSocket channel and
//! plain HTTP at once. Clients talk to it through
//! [`ConnectedRelayClient`](prelude::ConnectedRelayClient), or through
//! [`DisconnectedRelayClient`](prelude::DisconnectedRelayClient) when no
//! relay should be contacted.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use amman_relay::prelude::*;
//!
//! # async fn example() -> Result<(), RelayStackError> {
//! let relay = ConnectedRelayClient::connect(ClientConfig::default()).await?;
//! let labels = relay.fetch_address_labels().await?;
//! # let _ = labels;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod logging;

pub use amman_relay_client as client;
pub use amman_relay_protocol as protocol;
pub use amman_relay_server as server;
pub use amman_relay_transport as transport;

pub use error::RelayStackError;

/// Everything needed to run a relay or talk to one.
pub mod prelude {
    pub use crate::RelayStackError;
    pub use amman_relay_client::{
        ClientConfig, ConnectedRelayClient, DisconnectedRelayClient,
        RelayClient, RelayError, VersionGateError,
    };
    pub use amman_relay_protocol::{
        AccountSaveResult, AccountStatesResult, Address, AddressLabels,
        AddressLabelsResult, LoadKeypairResult, PersistedAccount,
        PersistedAccountInfo, RELAY_PORT, RELAY_VERSION, RelayAccountState,
        RelayReply, SecretKeyBytes, SnapshotSaveResult, VOID_REPLY,
        ValidatorPid, Version, VoidResult,
    };
    pub use amman_relay_server::{
        AccountPersister, AccountStateStore, AccountStates, AmmanRelayHandler,
        RelayConfig, RelayHandler, RelayServer, RelayServerBuilder,
        ServerError, ServerExit, ShutdownSignal, ValidatorManager,
    };
}

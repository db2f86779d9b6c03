//! Client side of the amman relay.
//!
//! Test code talks to a running amman through a [`RelayClient`]. Two
//! implementations exist:
//!
//! - [`ConnectedRelayClient`]: correlates requests with replies over one
//!   persistent connection, enforces per-call deadlines and checks the
//!   relay's version once before the first call.
//! - [`DisconnectedRelayClient`]: answers everything immediately with
//!   neutral values, for environments without a relay.
//!
//! Which one to use is decided once, when the client is built; nothing
//! downstream needs to know.
//!
//! # Example
//!
//! ```rust,no_run
//! use amman_relay_client::{ClientConfig, ConnectedRelayClient, RelayClient};
//!
//! # async fn example() -> Result<(), amman_relay_client::RelayError> {
//! let client = ConnectedRelayClient::connect(ClientConfig::default()).await?;
//! let labels = client.fetch_address_labels().await?;
//! println!("{} known labels", labels.len());
//! client.disconnect().await;
//! # Ok(())
//! # }
//! ```

mod config;
mod connected;
mod disconnected;
mod error;
mod gate;
mod pending;

use std::future::Future;

use amman_relay_protocol::{AddressLabels, PersistedAccountInfo, RelayAccountState};
use ed25519_dalek::SigningKey;

pub use config::{
    ClientConfig, RELAY_ACK_TIMEOUT, RELAY_LIFECYCLE_TIMEOUT, RELAY_TIMEOUT,
};
pub use connected::ConnectedRelayClient;
pub use disconnected::DisconnectedRelayClient;
pub use error::{RELAY_NOT_RUNNING_GUIDANCE, RelayError, VersionGateError};

/// Operations a test harness can ask of amman.
///
/// `Send + Sync + 'static` so a client can be shared across tasks behind
/// an `Arc`.
pub trait RelayClient: Send + Sync + 'static {
    /// Merges `labels` into the relay's known labels. Fire-and-forget:
    /// waits for an acknowledgement only if the client is configured to.
    fn add_address_labels(
        &self,
        labels: AddressLabels,
    ) -> impl Future<Output = Result<(), RelayError>> + Send;

    /// Clears every label the relay knows. Fire-and-forget, like
    /// [`add_address_labels`](Self::add_address_labels).
    fn clear_address_labels(
        &self,
    ) -> impl Future<Output = Result<(), RelayError>> + Send;

    /// Fetches every label the relay knows.
    fn fetch_address_labels(
        &self,
    ) -> impl Future<Output = Result<AddressLabels, RelayError>> + Send;

    /// Fetches every state observed for the account at `address`.
    fn fetch_account_states(
        &self,
        address: &str,
    ) -> impl Future<Output = Result<Vec<RelayAccountState>, RelayError>> + Send;

    /// Snapshots all observed accounts, labels and keypairs. Without a
    /// label the current UTC time is used. Returns the snapshot directory.
    fn request_snapshot(
        &self,
        label: Option<&str>,
    ) -> impl Future<Output = Result<String, RelayError>> + Send;

    /// Restarts the validator from a previously saved snapshot.
    fn request_load_snapshot(
        &self,
        label: &str,
    ) -> impl Future<Output = Result<(), RelayError>> + Send;

    /// Saves the current state of the account at `address` to disk.
    /// Returns the path of the written file.
    fn request_save_account(
        &self,
        address: &str,
    ) -> impl Future<Output = Result<String, RelayError>> + Send;

    /// Stores `keypair` under `id` for later retrieval.
    fn request_store_keypair(
        &self,
        id: &str,
        keypair: &SigningKey,
    ) -> impl Future<Output = Result<(), RelayError>> + Send;

    /// Loads the keypair stored under `id`. `None` if there is none, or if
    /// what is stored is not a valid keypair.
    fn request_load_keypair(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Option<SigningKey>, RelayError>> + Send;

    /// Restarts the validator with `account` overriding its on-chain data.
    fn request_set_account(
        &self,
        account: PersistedAccountInfo,
    ) -> impl Future<Output = Result<(), RelayError>> + Send;

    /// Restarts the validator, keeping accounts it has seen.
    fn request_restart_validator(
        &self,
    ) -> impl Future<Output = Result<(), RelayError>> + Send;

    /// Stops amman. The relay replies before it goes away.
    fn request_kill_amman(
        &self,
    ) -> impl Future<Output = Result<(), RelayError>> + Send;

    /// Closes the connection. Calls still waiting fail.
    fn disconnect(&self) -> impl Future<Output = ()> + Send;
}

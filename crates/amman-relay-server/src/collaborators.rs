//! The services the reference handler drives but does not implement.
//!
//! Starting and stopping the validator and writing accounts to disk live
//! outside the relay. The host plugs them in through these traits.

use std::collections::BTreeMap;
use std::future::Future;

use amman_relay_protocol::{
    Address, AddressLabels, PersistedAccountInfo, ValidatorPid,
};
use ed25519_dalek::SigningKey;

/// Error type collaborators report. Only its message reaches the client.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// What the relay knows about the running session: every account it has
/// observed, the labels it was given and the keypairs it holds.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub addresses: Vec<Address>,
    pub labels: AddressLabels,
    pub keypairs: BTreeMap<String, SigningKey>,
}

/// The accounts and keypairs a restarted validator starts with.
#[derive(Debug, Clone, Default)]
pub struct RestartOutcome {
    pub accounts: Vec<PersistedAccountInfo>,
    pub snapshot_accounts: Vec<PersistedAccountInfo>,
    pub keypairs: BTreeMap<String, SigningKey>,
}

/// Controls the local validator process.
pub trait ValidatorManager: Send + Sync + 'static {
    /// Process id of the running validator, `None` if none is running.
    fn pid(&self) -> Option<ValidatorPid>;

    /// Restarts the validator, preserving the accounts in `session`.
    fn restart(
        &self,
        session: SessionState,
    ) -> impl Future<Output = Result<RestartOutcome, BoxError>> + Send;

    /// Restarts the validator from the snapshot saved under `label`.
    fn restart_with_snapshot(
        &self,
        label: &str,
    ) -> impl Future<Output = Result<RestartOutcome, BoxError>> + Send;

    /// Restarts the validator, preserving `session` but with `overrides`
    /// replacing the on-chain data of their accounts.
    fn restart_with_overrides(
        &self,
        session: SessionState,
        overrides: Vec<PersistedAccountInfo>,
    ) -> impl Future<Output = Result<RestartOutcome, BoxError>> + Send;

    /// Stops the validator.
    fn kill(&self) -> impl Future<Output = Result<(), BoxError>> + Send;
}

/// Writes accounts and snapshots to disk.
pub trait AccountPersister: Send + Sync + 'static {
    /// Saves one account and returns the path written. With `data`, that
    /// data is saved instead of what is currently on chain.
    fn save_account(
        &self,
        address: Address,
        data: Option<Vec<u8>>,
    ) -> impl Future<Output = Result<String, BoxError>> + Send;

    /// Saves every account in `session` under `label`, returning the
    /// snapshot directory.
    fn snapshot(
        &self,
        label: &str,
        session: SessionState,
    ) -> impl Future<Output = Result<String, BoxError>> + Send;
}

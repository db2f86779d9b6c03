//! The relay handler contract and the one place requests are dispatched.
//!
//! Both transports decode a [`Request`] and hand it to [`dispatch`]. That
//! function is a single exhaustive `match`, so a new request kind cannot
//! be added without the compiler asking how it is handled, and the two
//! transports cannot drift apart.

use std::any::Any;
use std::future::Future;

use amman_relay_protocol::{
    AccountSaveResult, AccountStatesResult, AddressLabels, AddressLabelsResult,
    LoadKeypairResult, PersistedAccountInfo, ProtocolError, RELAY_VERSION,
    RelayReply, Request, SecretKeyBytes, SnapshotSaveResult, ValidatorPid,
    Version, VoidResult,
};
use serde::Serialize;
use serde_json::Value;

/// Answers relay requests.
///
/// One method per request kind. Every method returns a [`RelayReply`]:
/// failures are data (`{"err": ...}`), not Rust errors, because they are
/// sent to the client verbatim.
///
/// # Trait bounds
///
/// - `Send + Sync + 'static`: one handler is shared by every connection
///   of both transports, behind an `Arc`.
/// - Returned futures are `Send` so each request can run on its own task.
pub trait RelayHandler: Send + Sync + 'static {
    /// The protocol version this relay speaks. Default: [`RELAY_VERSION`].
    fn version(&self) -> impl Future<Output = RelayReply<Version>> + Send {
        async { RelayReply::Result(RELAY_VERSION) }
    }

    fn validator_pid(
        &self,
    ) -> impl Future<Output = RelayReply<ValidatorPid>> + Send;

    /// Stops the validator. The router raises the shutdown signal after
    /// the reply is written, if this succeeded.
    fn kill_amman(&self) -> impl Future<Output = RelayReply<VoidResult>> + Send;

    fn restart_validator(
        &self,
    ) -> impl Future<Output = RelayReply<VoidResult>> + Send;

    fn account_states(
        &self,
        address: String,
    ) -> impl Future<Output = RelayReply<AccountStatesResult>> + Send;

    /// Saves an account to disk. With `slot`, saves the data recorded at
    /// that slot instead of the current on-chain data.
    fn account_save(
        &self,
        address: String,
        slot: Option<u64>,
    ) -> impl Future<Output = RelayReply<AccountSaveResult>> + Send;

    fn set_account(
        &self,
        account: PersistedAccountInfo,
    ) -> impl Future<Output = RelayReply<VoidResult>> + Send;

    fn snapshot_save(
        &self,
        label: String,
    ) -> impl Future<Output = RelayReply<SnapshotSaveResult>> + Send;

    fn load_snapshot(
        &self,
        label: String,
    ) -> impl Future<Output = RelayReply<VoidResult>> + Send;

    fn store_keypair(
        &self,
        id: String,
        secret_key: SecretKeyBytes,
    ) -> impl Future<Output = RelayReply<VoidResult>> + Send;

    fn load_keypair(
        &self,
        id: String,
    ) -> impl Future<Output = RelayReply<LoadKeypairResult>> + Send;

    fn update_address_labels(
        &self,
        labels: AddressLabels,
    ) -> impl Future<Output = RelayReply<VoidResult>> + Send;

    fn clear_address_labels(
        &self,
    ) -> impl Future<Output = RelayReply<VoidResult>> + Send;

    fn fetch_address_labels(
        &self,
    ) -> impl Future<Output = RelayReply<AddressLabelsResult>> + Send;
}

/// Runs `request` against `handler` and encodes the reply envelope.
///
/// # Errors
/// Returns `ProtocolError::Encode` only if the reply cannot be serialized.
pub async fn dispatch<H: RelayHandler>(
    handler: &H,
    request: Request,
) -> Result<Value, ProtocolError> {
    match request {
        Request::Version => encode(handler.version().await),
        Request::ValidatorPid => encode(handler.validator_pid().await),
        Request::KillAmman => encode(handler.kill_amman().await),
        Request::RestartValidator => encode(handler.restart_validator().await),
        Request::AccountStates { address } => {
            encode(handler.account_states(address).await)
        }
        Request::AccountSave { address, slot } => {
            encode(handler.account_save(address, slot).await)
        }
        Request::SetAccount { account } => {
            encode(handler.set_account(account).await)
        }
        Request::SnapshotSave { label } => {
            encode(handler.snapshot_save(label).await)
        }
        Request::LoadSnapshot { label } => {
            encode(handler.load_snapshot(label).await)
        }
        Request::StoreKeypair { id, secret_key } => {
            encode(handler.store_keypair(id, secret_key).await)
        }
        Request::LoadKeypair { id } => encode(handler.load_keypair(id).await),
        Request::UpdateAddressLabels { labels } => {
            encode(handler.update_address_labels(labels).await)
        }
        Request::ClearAddressLabels => {
            encode(handler.clear_address_labels().await)
        }
        Request::FetchAddressLabels => {
            encode(handler.fetch_address_labels().await)
        }
    }
}

fn encode<T: Serialize>(reply: RelayReply<T>) -> Result<Value, ProtocolError> {
    serde_json::to_value(reply).map_err(ProtocolError::Encode)
}

/// The `{"err": ...}` envelope for a request that never reached the handler.
pub(crate) fn err_envelope(message: impl std::fmt::Display) -> Value {
    serde_json::json!({ "err": message.to_string() })
}

/// The text of a caught handler panic.
pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "relay handler panicked".to_string()
    }
}

/// `true` unless `envelope` carries an error.
pub(crate) fn is_success(envelope: &Value) -> bool {
    envelope.get("err").is_none_or(Value::is_null)
}

//! The relay client that talks to a live relay.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use amman_relay_protocol::{
    AccountSaveResult, AccountStatesResult, AckReply, AddressLabels,
    AddressLabelsResult, Address, Codec, Frame, JsonCodec, LoadKeypairResult,
    PersistedAccountInfo, RelayAccountState, RelayReply, Request,
    SecretKeyBytes, SnapshotSaveResult, ValidatorPid, Version, VoidResult,
};
use amman_relay_transport::{Connection, WebSocketConnection};
use ed25519_dalek::SigningKey;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::{Mutex, OnceCell};
use tokio::task::JoinHandle;
use tracing::{debug, error, trace, warn};

use crate::gate::check_version_reply;
use crate::pending::PendingTable;
use crate::{ClientConfig, RelayClient, RelayError, VersionGateError};

struct Shared<C> {
    conn: C,
    codec: JsonCodec,
    pending: Mutex<PendingTable>,
    next_id: AtomicU64,
    gate: OnceCell<Result<Version, VersionGateError>>,
    config: ClientConfig,
}

impl<C: Connection> Shared<C> {
    async fn handshake(self: &Arc<Self>) -> Result<Version, VersionGateError> {
        let reply = self
            .round_trip("fetch version", Request::Version, self.config.timeout)
            .await
            .map_err(|e| VersionGateError::Unreachable(e.to_string()))?;
        let outcome = check_version_reply(reply);
        if let Err(e) = &outcome {
            error!("{e}");
        }
        outcome
    }

    async fn round_trip(
        self: &Arc<Self>,
        action: &str,
        request: Request,
        timeout: Duration,
    ) -> Result<Value, RelayError> {
        let (kind, args) = request.into_args()?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let rx = self.pending.lock().await.register(id, kind.response())?;
        let _pending = PendingGuard {
            shared: Arc::clone(self),
            id,
        };

        trace!(request = %kind, id, "-> {action}");
        self.send_frame(Frame::request(kind, id, args)).await?;

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(delivery)) => {
                trace!(request = %kind, id, "<- {action}");
                delivery
            }
            Ok(Err(_)) => Err(RelayError::Closed),
            Err(_) => {
                let err = RelayError::Timeout {
                    action: action.to_string(),
                };
                error!(request = %kind, id, "{err}");
                Err(err)
            }
        }
    }

    async fn send_frame(&self, frame: Frame) -> Result<(), RelayError> {
        let bytes = self.codec.encode(&frame)?;
        self.conn
            .send(&bytes)
            .await
            .map_err(|e| RelayError::Transport(e.to_string()))
    }
}

/// Forgets a registered call when its caller stops waiting, whether it
/// got a reply, timed out, or was dropped mid-flight.
struct PendingGuard<C: Connection> {
    shared: Arc<Shared<C>>,
    id: u64,
}

impl<C: Connection> Drop for PendingGuard<C> {
    fn drop(&mut self) {
        let id = self.id;
        if let Ok(mut pending) = self.shared.pending.try_lock() {
            pending.cancel(id);
            return;
        }
        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            shared.pending.lock().await.cancel(id);
        });
    }
}

/// A relay client bound to one persistent connection.
///
/// Requests are correlated with replies by id, so any number of calls,
/// including calls of the same kind, may be outstanding at once. Before
/// the first call the client checks the relay's version, once; the
/// outcome of that check, good or bad, applies to every later call.
///
/// A background task reads replies for the lifetime of the client. It is
/// stopped on [`disconnect`](RelayClient::disconnect) or drop.
pub struct ConnectedRelayClient<C: Connection = WebSocketConnection> {
    shared: Arc<Shared<C>>,
    reader: JoinHandle<()>,
}

impl ConnectedRelayClient<WebSocketConnection> {
    /// Opens a WebSocket connection to `config.url`.
    pub async fn connect(config: ClientConfig) -> Result<Self, RelayError> {
        let conn = WebSocketConnection::connect(&config.url).await?;
        Ok(Self::new(conn, config))
    }
}

impl<C: Connection> ConnectedRelayClient<C> {
    /// Wraps an established connection. Must be called from within a
    /// tokio runtime.
    pub fn new(conn: C, config: ClientConfig) -> Self {
        let shared = Arc::new(Shared {
            conn,
            codec: JsonCodec,
            pending: Mutex::new(PendingTable::default()),
            next_id: AtomicU64::new(1),
            gate: OnceCell::new(),
            config,
        });
        let reader = tokio::spawn(read_replies(Arc::clone(&shared)));
        Self { shared, reader }
    }

    /// The configuration this client was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.shared.config
    }

    /// Number of calls still waiting for a reply.
    pub async fn outstanding(&self) -> usize {
        self.shared.pending.lock().await.len()
    }

    /// Checks the relay's version, performing the handshake on first use.
    ///
    /// The handshake runs on its own task, so a caller that gives up
    /// early does not cause a second handshake.
    pub async fn verify_version(&self) -> Result<Version, RelayError> {
        if let Some(outcome) = self.shared.gate.get() {
            return outcome.clone().map_err(RelayError::from);
        }
        let shared = Arc::clone(&self.shared);
        let outcome = tokio::spawn(async move {
            shared.gate.get_or_init(|| shared.handshake()).await.clone()
        })
        .await
        .unwrap_or_else(|e| Err(VersionGateError::Unreachable(e.to_string())));
        outcome.map_err(RelayError::from)
    }

    /// Sends `request` after the version check and waits up to `timeout`
    /// for the raw reply payload.
    pub async fn call(
        &self,
        action: &str,
        request: Request,
        timeout: Duration,
    ) -> Result<Value, RelayError> {
        self.verify_version().await?;
        self.shared.round_trip(action, request, timeout).await
    }

    async fn request<T: DeserializeOwned>(
        &self,
        action: &str,
        request: Request,
        timeout: Duration,
    ) -> Result<T, RelayError> {
        let reply = self.call(action, request, timeout).await?;
        RelayReply::<T>::from_value(reply)?
            .into_result()
            .map_err(|err| {
                error!("{action}: {err}");
                RelayError::Server(err)
            })
    }

    /// Sends a request that has no reply. With acks enabled, waits for
    /// the relay to confirm it was applied.
    async fn fire_and_forget(
        &self,
        action: &str,
        request: Request,
    ) -> Result<(), RelayError> {
        if !self.shared.config.ack {
            let (kind, args) = request.into_args()?;
            let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
            trace!(request = %kind, id, "-> {action}");
            return self.shared.send_frame(Frame::request(kind, id, args)).await;
        }

        let reply = self
            .shared
            .round_trip(action, request, self.shared.config.ack_timeout)
            .await?;
        let ack: AckReply = serde_json::from_value(reply)
            .map_err(amman_relay_protocol::ProtocolError::Decode)?;
        ack.into_result().map_err(RelayError::Server)
    }

    /// Fetches the relay's version. Passes the version check first.
    pub async fn fetch_version(&self) -> Result<Version, RelayError> {
        self.request("fetch version", Request::Version, self.shared.config.timeout)
            .await
    }

    /// Fetches the process id of the running validator.
    pub async fn fetch_validator_pid(&self) -> Result<ValidatorPid, RelayError> {
        self.request(
            "fetch validator pid",
            Request::ValidatorPid,
            self.shared.config.timeout,
        )
        .await
    }

    /// Saves the state of `address` observed at `slot` rather than its
    /// current on-chain data. Returns the path of the written file.
    pub async fn request_save_account_at_slot(
        &self,
        address: &str,
        slot: u64,
    ) -> Result<String, RelayError> {
        self.save_account(address, Some(slot)).await
    }

    async fn save_account(
        &self,
        address: &str,
        slot: Option<u64>,
    ) -> Result<String, RelayError> {
        let result: AccountSaveResult = self
            .request(
                &format!("save account {address}"),
                Request::AccountSave {
                    address: address.to_string(),
                    slot,
                },
                self.shared.config.timeout,
            )
            .await?;
        Ok(result.account_path)
    }
}

impl<C: Connection> Drop for ConnectedRelayClient<C> {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

impl<C: Connection> RelayClient for ConnectedRelayClient<C> {
    async fn add_address_labels(
        &self,
        labels: AddressLabels,
    ) -> Result<(), RelayError> {
        self.fire_and_forget(
            "add address labels",
            Request::UpdateAddressLabels { labels },
        )
        .await
    }

    async fn clear_address_labels(&self) -> Result<(), RelayError> {
        self.fire_and_forget("clear address labels", Request::ClearAddressLabels)
            .await
    }

    async fn fetch_address_labels(&self) -> Result<AddressLabels, RelayError> {
        let result: AddressLabelsResult = self
            .request(
                "fetch address labels",
                Request::FetchAddressLabels,
                self.shared.config.timeout,
            )
            .await?;
        Ok(result.labels)
    }

    async fn fetch_account_states(
        &self,
        address: &str,
    ) -> Result<Vec<RelayAccountState>, RelayError> {
        let result: AccountStatesResult = self
            .request(
                &format!("fetch account states for {address}"),
                Request::AccountStates {
                    address: address.to_string(),
                },
                self.shared.config.timeout,
            )
            .await?;
        Ok(result.states)
    }

    async fn request_snapshot(
        &self,
        label: Option<&str>,
    ) -> Result<String, RelayError> {
        let label = label.map_or_else(default_snapshot_label, str::to_string);
        let result: SnapshotSaveResult = self
            .request(
                "request snapshot accounts",
                Request::SnapshotSave { label },
                self.shared.config.timeout,
            )
            .await?;
        Ok(result.snapshot_dir)
    }

    async fn request_load_snapshot(&self, label: &str) -> Result<(), RelayError> {
        self.request::<VoidResult>(
            &format!("load snapshot {label}"),
            Request::LoadSnapshot {
                label: label.to_string(),
            },
            self.shared.config.lifecycle_timeout,
        )
        .await
        .map(drop)
    }

    async fn request_save_account(
        &self,
        address: &str,
    ) -> Result<String, RelayError> {
        self.save_account(address, None).await
    }

    async fn request_store_keypair(
        &self,
        id: &str,
        keypair: &SigningKey,
    ) -> Result<(), RelayError> {
        let public = Address::new(keypair.verifying_key().to_bytes());
        let secret_key = SecretKeyBytes::new(keypair.to_keypair_bytes().to_vec());
        self.request::<VoidResult>(
            &format!("store keypair {id} ({public})"),
            Request::StoreKeypair {
                id: id.to_string(),
                secret_key,
            },
            self.shared.config.timeout,
        )
        .await
        .map(drop)
    }

    async fn request_load_keypair(
        &self,
        id: &str,
    ) -> Result<Option<SigningKey>, RelayError> {
        let result: LoadKeypairResult = self
            .request(
                &format!("load keypair {id}"),
                Request::LoadKeypair { id: id.to_string() },
                self.shared.config.timeout,
            )
            .await?;
        Ok(result
            .secret_key_bytes
            .and_then(|secret| decode_keypair(id, secret)))
    }

    async fn request_set_account(
        &self,
        account: PersistedAccountInfo,
    ) -> Result<(), RelayError> {
        let action = format!("set account {}", account.pubkey);
        self.request::<VoidResult>(
            &action,
            Request::SetAccount { account },
            self.shared.config.lifecycle_timeout,
        )
        .await
        .map(drop)
    }

    async fn request_restart_validator(&self) -> Result<(), RelayError> {
        self.request::<VoidResult>(
            "restart validator",
            Request::RestartValidator,
            self.shared.config.lifecycle_timeout,
        )
        .await
        .map(drop)
    }

    async fn request_kill_amman(&self) -> Result<(), RelayError> {
        self.request::<VoidResult>(
            "kill amman",
            Request::KillAmman,
            self.shared.config.lifecycle_timeout,
        )
        .await
        .map(drop)
    }

    async fn disconnect(&self) {
        self.shared.pending.lock().await.fail_all("client disconnected");
        if let Err(e) = self.shared.conn.close().await {
            debug!(error = %e, "error while closing relay connection");
        }
        self.reader.abort();
        debug!(conn = %self.shared.conn.id(), "disconnected from relay");
    }
}

/// Reads replies until the connection ends, then fails whatever is left.
async fn read_replies<C: Connection>(shared: Arc<Shared<C>>) {
    let reason = loop {
        match shared.conn.recv().await {
            Ok(Some(data)) => {
                let frame: Frame = match shared.codec.decode(&data) {
                    Ok(frame) => frame,
                    Err(e) => {
                        warn!(error = %e, "dropping undecodable relay message");
                        continue;
                    }
                };
                let event = frame.event.clone();
                let id = frame.id;
                if shared.pending.lock().await.resolve(frame).is_none() {
                    trace!(event, ?id, "no call waiting for reply, dropping");
                }
            }
            Ok(None) => break "relay closed the connection".to_string(),
            Err(e) => break e.to_string(),
        }
    };
    debug!(reason, "relay connection ended");
    shared.pending.lock().await.fail_all(&reason);
}

/// An ISO-8601 UTC timestamp usable as a directory name.
fn default_snapshot_label() -> String {
    chrono::Utc::now()
        .to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
        .replace([':', '.'], "_")
}

fn decode_keypair(id: &str, secret: SecretKeyBytes) -> Option<SigningKey> {
    let bytes: [u8; 64] = match secret.into_bytes().try_into() {
        Ok(bytes) => bytes,
        Err(bytes) => {
            let len = bytes.len();
            warn!(id, len, "stored keypair has the wrong length, ignoring it");
            return None;
        }
    };
    match SigningKey::from_keypair_bytes(&bytes) {
        Ok(key) => Some(key),
        Err(e) => {
            warn!(id, error = %e, "stored keypair is invalid, ignoring it");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_snapshot_label_is_path_safe() {
        let label = default_snapshot_label();
        assert!(!label.contains(':'));
        assert!(!label.contains('.'));
        assert!(label.ends_with('Z'));
    }

    #[test]
    fn test_decode_keypair_round_trips_valid_key() {
        let key = SigningKey::from_bytes(&[7; 32]);
        let secret = SecretKeyBytes::new(key.to_keypair_bytes().to_vec());
        let decoded = decode_keypair("payer", secret).unwrap();
        assert_eq!(decoded.to_bytes(), key.to_bytes());
    }

    #[test]
    fn test_decode_keypair_rejects_wrong_length() {
        assert!(decode_keypair("short", SecretKeyBytes::new(vec![1; 10])).is_none());
    }

    #[test]
    fn test_decode_keypair_rejects_mismatched_public_half() {
        let mut bytes = SigningKey::from_bytes(&[7; 32]).to_keypair_bytes();
        bytes[63] ^= 0xff;
        assert!(decode_keypair("bad", SecretKeyBytes::new(bytes.to_vec())).is_none());
    }
}

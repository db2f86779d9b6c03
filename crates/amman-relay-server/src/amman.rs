//! The reference [`RelayHandler`]: a relay in front of a local validator.

use std::sync::Arc;

use amman_relay_protocol::{
    AccountSaveResult, AccountStatesResult, Address, AddressLabels,
    AddressLabelsResult, LoadKeypairResult, PersistedAccountInfo, RelayReply,
    SecretKeyBytes, SnapshotSaveResult, VOID_REPLY, ValidatorPid, VoidResult,
};
use ed25519_dalek::SigningKey;
use tokio::sync::RwLock;

use crate::accounts::{AccountObservers, AccountStateStore, AccountStates};
use crate::collaborators::{
    AccountPersister, BoxError, RestartOutcome, SessionState, ValidatorManager,
};
use crate::RelayHandler;

const NO_VALIDATOR: &str =
    "It seems like no validator is running currently, cannot get pid";

/// Serves relay requests from a validator manager, an account persister
/// and an account-state store.
///
/// Every restart (plain, from a snapshot, or with an overridden account)
/// replaces the store with a fresh one built from what the validator
/// restarted with. The new store reports to the same
/// [`AccountObservers`], so subscribers keep receiving updates.
pub struct AmmanRelayHandler<V, P, S = AccountStates> {
    validator: V,
    persister: P,
    states: RwLock<S>,
    labels: RwLock<AddressLabels>,
    observers: Arc<AccountObservers>,
}

impl<V, P, S> AmmanRelayHandler<V, P, S>
where
    V: ValidatorManager,
    P: AccountPersister,
    S: AccountStateStore,
{
    pub fn new(validator: V, persister: P, store: S) -> Self {
        let observers = Arc::clone(store.observers());
        Self {
            validator,
            persister,
            states: RwLock::new(store),
            labels: RwLock::new(AddressLabels::new()),
            observers,
        }
    }

    /// The current store. Hosts record newly observed states through it.
    pub fn states(&self) -> &RwLock<S> {
        &self.states
    }

    /// Observers shared by the current store and every future one.
    pub fn observers(&self) -> &Arc<AccountObservers> {
        &self.observers
    }

    pub fn validator(&self) -> &V {
        &self.validator
    }

    pub fn persister(&self) -> &P {
        &self.persister
    }

    async fn session(&self) -> SessionState {
        let labels = self.labels.read().await.clone();
        let states = self.states.read().await;
        SessionState {
            addresses: states.all_addresses(),
            labels,
            keypairs: states.all_keypairs(),
        }
    }

    async fn replace_store(
        &self,
        restarted: Result<RestartOutcome, BoxError>,
    ) -> RelayReply<VoidResult> {
        let outcome = match restarted {
            Ok(outcome) => outcome,
            Err(e) => return RelayReply::err(e),
        };
        let mut accounts = outcome.accounts;
        accounts.extend(outcome.snapshot_accounts);
        let store = S::rebuild(
            Arc::clone(&self.observers),
            &accounts,
            outcome.keypairs,
        );
        *self.states.write().await = store;
        tracing::debug!(accounts = accounts.len(), "account store replaced");
        VOID_REPLY
    }
}

impl<V, P, S> RelayHandler for AmmanRelayHandler<V, P, S>
where
    V: ValidatorManager,
    P: AccountPersister,
    S: AccountStateStore,
{
    async fn validator_pid(&self) -> RelayReply<ValidatorPid> {
        match self.validator.pid() {
            Some(pid) => RelayReply::Result(pid),
            None => RelayReply::err(NO_VALIDATOR),
        }
    }

    async fn kill_amman(&self) -> RelayReply<VoidResult> {
        match self.validator.kill().await {
            Ok(()) => VOID_REPLY,
            Err(e) => {
                tracing::error!(error = %e, "failed to kill validator");
                RelayReply::err(e)
            }
        }
    }

    async fn restart_validator(&self) -> RelayReply<VoidResult> {
        let session = self.session().await;
        tracing::info!(accounts = session.addresses.len(), "restarting validator");
        let restarted = self.validator.restart(session).await;
        self.replace_store(restarted).await
    }

    async fn account_states(
        &self,
        address: String,
    ) -> RelayReply<AccountStatesResult> {
        let parsed = match address.parse::<Address>() {
            Ok(parsed) => parsed,
            Err(e) => return RelayReply::err(e),
        };
        let states = self.states.read().await.relay_states(&parsed);
        RelayReply::Result(AccountStatesResult { address, states })
    }

    async fn account_save(
        &self,
        address: String,
        slot: Option<u64>,
    ) -> RelayReply<AccountSaveResult> {
        let parsed = match address.parse::<Address>() {
            Ok(parsed) => parsed,
            Err(e) => return RelayReply::err(e),
        };
        let data = match slot {
            Some(slot) => {
                self.states.read().await.account_data_for_slot(&parsed, slot)
            }
            None => None,
        };
        self.persister
            .save_account(parsed, data)
            .await
            .map(|account_path| AccountSaveResult { address, account_path })
            .into()
    }

    async fn set_account(
        &self,
        account: PersistedAccountInfo,
    ) -> RelayReply<VoidResult> {
        let session = self.session().await;
        tracing::info!(pubkey = %account.pubkey, "restarting validator with account override");
        let restarted = self
            .validator
            .restart_with_overrides(session, vec![account])
            .await;
        self.replace_store(restarted).await
    }

    async fn snapshot_save(&self, label: String) -> RelayReply<SnapshotSaveResult> {
        let session = self.session().await;
        self.persister
            .snapshot(&label, session)
            .await
            .map(|snapshot_dir| SnapshotSaveResult { snapshot_dir })
            .into()
    }

    async fn load_snapshot(&self, label: String) -> RelayReply<VoidResult> {
        tracing::info!(%label, "restarting validator from snapshot");
        let restarted = self.validator.restart_with_snapshot(&label).await;
        self.replace_store(restarted).await
    }

    async fn store_keypair(
        &self,
        id: String,
        secret_key: SecretKeyBytes,
    ) -> RelayReply<VoidResult> {
        let keypair = match signing_key(&secret_key) {
            Ok(keypair) => keypair,
            Err(e) => return RelayReply::err(format!("Invalid keypair {id}: {e}")),
        };
        self.states.write().await.store_keypair(id, keypair);
        VOID_REPLY
    }

    async fn load_keypair(&self, id: String) -> RelayReply<LoadKeypairResult> {
        let secret_key_bytes = self
            .states
            .read()
            .await
            .keypair_by_id(&id)
            .map(|keypair| SecretKeyBytes::new(keypair.to_keypair_bytes().to_vec()));
        RelayReply::Result(LoadKeypairResult { id, secret_key_bytes })
    }

    async fn update_address_labels(
        &self,
        labels: AddressLabels,
    ) -> RelayReply<VoidResult> {
        self.states.write().await.label_keypairs(&labels);
        self.labels.write().await.extend(labels);
        VOID_REPLY
    }

    async fn clear_address_labels(&self) -> RelayReply<VoidResult> {
        self.labels.write().await.clear();
        VOID_REPLY
    }

    async fn fetch_address_labels(&self) -> RelayReply<AddressLabelsResult> {
        let labels = self.labels.read().await.clone();
        RelayReply::Result(AddressLabelsResult { labels })
    }
}

/// Rebuilds a keypair from its 64 secret bytes, checking that the public
/// half matches the secret half.
fn signing_key(secret_key: &SecretKeyBytes) -> Result<SigningKey, String> {
    let bytes: &[u8; 64] = secret_key
        .as_bytes()
        .try_into()
        .map_err(|_| format!("expected 64 bytes, got {}", secret_key.as_bytes().len()))?;
    SigningKey::from_keypair_bytes(bytes).map_err(|e| e.to_string())
}

//! Observed account states and the keypairs of the running session.
//!
//! A store lives for one validator run. Restarts build a fresh one, but
//! subscribers must not notice: they subscribe to [`AccountObservers`],
//! which outlives every store it is handed to.

use std::collections::BTreeMap;
use std::sync::Arc;

use amman_relay_protocol::{
    Address, AddressLabels, PersistedAccountInfo, RelayAccountState,
};
use ed25519_dalek::SigningKey;
use tokio::sync::broadcast;

/// Updates buffered per subscriber before the slowest one starts missing
/// updates.
const OBSERVER_CAPACITY: usize = 256;

/// A newly observed account state.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountStateUpdate {
    pub address: Address,
    pub state: RelayAccountState,
}

/// Subscribers to account state updates.
#[derive(Debug)]
pub struct AccountObservers {
    tx: broadcast::Sender<AccountStateUpdate>,
}

impl AccountObservers {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(OBSERVER_CAPACITY);
        Self { tx }
    }

    /// Receives every update recorded from now on, by this store and by
    /// every store that replaces it.
    pub fn subscribe(&self) -> broadcast::Receiver<AccountStateUpdate> {
        self.tx.subscribe()
    }

    pub fn observer_count(&self) -> usize {
        self.tx.receiver_count()
    }

    fn notify(&self, update: AccountStateUpdate) {
        // No subscribers is fine.
        let _ = self.tx.send(update);
    }
}

impl Default for AccountObservers {
    fn default() -> Self {
        Self::new()
    }
}

/// What the relay handler needs from an account-state store.
pub trait AccountStateStore: Send + Sync + 'static {
    /// A fresh store for a restarted validator, knowing `accounts` and
    /// holding `keypairs`, reporting to the existing `observers`.
    fn rebuild(
        observers: Arc<AccountObservers>,
        accounts: &[PersistedAccountInfo],
        keypairs: BTreeMap<String, SigningKey>,
    ) -> Self
    where
        Self: Sized;

    fn observers(&self) -> &Arc<AccountObservers>;

    /// Every recorded state of `address`, oldest first.
    fn relay_states(&self, address: &Address) -> Vec<RelayAccountState>;

    fn all_addresses(&self) -> Vec<Address>;

    fn all_keypairs(&self) -> BTreeMap<String, SigningKey>;

    fn store_keypair(&mut self, id: String, keypair: SigningKey);

    fn keypair_by_id(&self, id: &str) -> Option<SigningKey>;

    /// Makes every held keypair whose address carries a label loadable by
    /// that label too.
    fn label_keypairs(&mut self, labels: &AddressLabels);

    /// Raw account data recorded for `address` at `slot`.
    fn account_data_for_slot(&self, address: &Address, slot: u64)
    -> Option<Vec<u8>>;
}

#[derive(Debug, Clone)]
struct RecordedState {
    state: RelayAccountState,
    data: Vec<u8>,
}

/// In-memory [`AccountStateStore`].
#[derive(Debug)]
pub struct AccountStates {
    accounts: BTreeMap<Address, Vec<RecordedState>>,
    keypairs: BTreeMap<String, SigningKey>,
    observers: Arc<AccountObservers>,
}

impl AccountStates {
    /// An empty store with its own observer registry.
    pub fn new() -> Self {
        Self::with_observers(Arc::new(AccountObservers::new()))
    }

    pub fn with_observers(observers: Arc<AccountObservers>) -> Self {
        Self {
            accounts: BTreeMap::new(),
            keypairs: BTreeMap::new(),
            observers,
        }
    }

    /// Starts tracking `address` without recording a state for it.
    pub fn track(&mut self, address: Address) {
        self.accounts.entry(address).or_default();
    }

    /// Records a newly observed state of `address` with its raw data and
    /// tells the observers.
    pub fn record(
        &mut self,
        address: Address,
        state: RelayAccountState,
        data: Vec<u8>,
    ) {
        self.accounts.entry(address).or_default().push(RecordedState {
            state: state.clone(),
            data,
        });
        self.observers.notify(AccountStateUpdate { address, state });
    }
}

impl Default for AccountStates {
    fn default() -> Self {
        Self::new()
    }
}

impl AccountStateStore for AccountStates {
    fn rebuild(
        observers: Arc<AccountObservers>,
        accounts: &[PersistedAccountInfo],
        keypairs: BTreeMap<String, SigningKey>,
    ) -> Self {
        let mut store = Self::with_observers(observers);
        for info in accounts {
            match info.pubkey.parse::<Address>() {
                Ok(address) => store.track(address),
                Err(e) => {
                    tracing::warn!(pubkey = %info.pubkey, error = %e, "skipping persisted account");
                }
            }
        }
        store.keypairs = keypairs;
        store
    }

    fn observers(&self) -> &Arc<AccountObservers> {
        &self.observers
    }

    fn relay_states(&self, address: &Address) -> Vec<RelayAccountState> {
        self.accounts
            .get(address)
            .map(|states| states.iter().map(|s| s.state.clone()).collect())
            .unwrap_or_default()
    }

    fn all_addresses(&self) -> Vec<Address> {
        self.accounts.keys().copied().collect()
    }

    fn all_keypairs(&self) -> BTreeMap<String, SigningKey> {
        self.keypairs.clone()
    }

    fn store_keypair(&mut self, id: String, keypair: SigningKey) {
        self.track(Address::new(keypair.verifying_key().to_bytes()));
        self.keypairs.insert(id, keypair);
    }

    fn keypair_by_id(&self, id: &str) -> Option<SigningKey> {
        self.keypairs.get(id).cloned()
    }

    fn label_keypairs(&mut self, labels: &AddressLabels) {
        let labelled: Vec<(String, SigningKey)> = self
            .keypairs
            .values()
            .filter_map(|keypair| {
                let address =
                    Address::new(keypair.verifying_key().to_bytes()).to_string();
                labels
                    .get(&address)
                    .map(|label| (label.clone(), keypair.clone()))
            })
            .collect();
        self.keypairs.extend(labelled);
    }

    fn account_data_for_slot(
        &self,
        address: &Address,
        slot: u64,
    ) -> Option<Vec<u8>> {
        self.accounts
            .get(address)?
            .iter()
            .rev()
            .find(|recorded| recorded.state.slot == slot)
            .map(|recorded| recorded.data.clone())
    }
}

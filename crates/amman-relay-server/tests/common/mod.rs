//! Scripted collaborators shared by the server integration tests.
#![allow(dead_code)]

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use amman_relay_protocol::{
    Address, PersistedAccount, PersistedAccountInfo, ValidatorPid,
};
use amman_relay_server::{
    AccountPersister, AccountStates, AmmanRelayHandler, BoxError,
    RestartOutcome, SessionState, ValidatorManager,
};

pub type TestHandler = AmmanRelayHandler<MockValidator, MockPersister>;

/// A validator that restarts instantly with whatever it was given.
#[derive(Default)]
pub struct MockValidator {
    pub pid: Option<ValidatorPid>,
    /// `pid()` panics instead of answering.
    pub crash_on_pid: bool,
    pub restart_delay: Duration,
    pub restarts: Mutex<Vec<String>>,
    pub killed: AtomicBool,
}

impl MockValidator {
    pub fn running(pid: ValidatorPid) -> Self {
        Self {
            pid: Some(pid),
            ..Self::default()
        }
    }

    pub fn restarts(&self) -> Vec<String> {
        self.restarts.lock().unwrap().clone()
    }

    pub fn was_killed(&self) -> bool {
        self.killed.load(Ordering::SeqCst)
    }

    async fn restarting(&self, how: String) {
        tokio::time::sleep(self.restart_delay).await;
        self.restarts.lock().unwrap().push(how);
    }
}

impl ValidatorManager for MockValidator {
    fn pid(&self) -> Option<ValidatorPid> {
        assert!(!self.crash_on_pid, "validator pid lookup crashed");
        self.pid
    }

    async fn restart(
        &self,
        session: SessionState,
    ) -> Result<RestartOutcome, BoxError> {
        self.restarting("plain".into()).await;
        Ok(RestartOutcome {
            accounts: session.addresses.iter().map(|a| persisted(*a)).collect(),
            snapshot_accounts: Vec::new(),
            keypairs: session.keypairs,
        })
    }

    async fn restart_with_snapshot(
        &self,
        label: &str,
    ) -> Result<RestartOutcome, BoxError> {
        if label == "missing" {
            return Err(format!("snapshot {label} not found").into());
        }
        self.restarting(format!("snapshot {label}")).await;
        Ok(RestartOutcome {
            accounts: Vec::new(),
            snapshot_accounts: vec![persisted(snapshot_address())],
            keypairs: Default::default(),
        })
    }

    async fn restart_with_overrides(
        &self,
        session: SessionState,
        overrides: Vec<PersistedAccountInfo>,
    ) -> Result<RestartOutcome, BoxError> {
        self.restarting(format!("overrides {}", overrides.len())).await;
        let mut accounts: Vec<PersistedAccountInfo> =
            session.addresses.iter().map(|a| persisted(*a)).collect();
        accounts.extend(overrides);
        Ok(RestartOutcome {
            accounts,
            snapshot_accounts: Vec::new(),
            keypairs: session.keypairs,
        })
    }

    async fn kill(&self) -> Result<(), BoxError> {
        self.killed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Records what it was asked to write.
#[derive(Default)]
pub struct MockPersister {
    pub saved: Mutex<Vec<(Address, Option<Vec<u8>>)>>,
    pub snapshots: Mutex<Vec<(String, SessionState)>>,
    pub fail: bool,
}

impl MockPersister {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }
}

impl AccountPersister for MockPersister {
    async fn save_account(
        &self,
        address: Address,
        data: Option<Vec<u8>>,
    ) -> Result<String, BoxError> {
        if self.fail {
            return Err("disk full".into());
        }
        self.saved.lock().unwrap().push((address, data));
        Ok(format!("/tmp/amman/accounts/{address}.json"))
    }

    async fn snapshot(
        &self,
        label: &str,
        session: SessionState,
    ) -> Result<String, BoxError> {
        if self.fail {
            return Err("disk full".into());
        }
        self.snapshots.lock().unwrap().push((label.to_string(), session));
        Ok(format!("/tmp/amman/snapshots/{label}"))
    }
}

pub fn handler(validator: MockValidator) -> TestHandler {
    AmmanRelayHandler::new(validator, MockPersister::default(), AccountStates::new())
}

pub fn persisted(address: Address) -> PersistedAccountInfo {
    PersistedAccountInfo {
        pubkey: address.to_string(),
        account: PersistedAccount {
            lamports: 1_000_000,
            data: ("AAEC".into(), "base64".into()),
            owner: Address::new([0; 32]).to_string(),
            executable: false,
            rent_epoch: 0,
        },
    }
}

pub fn snapshot_address() -> Address {
    Address::new([42; 32])
}

//! The relay client used when no relay is running.
//!
//! Lets tooling call the same [`RelayClient`] API unconditionally.

use amman_relay_protocol::{AddressLabels, PersistedAccountInfo, RelayAccountState};
use ed25519_dalek::SigningKey;
use tracing::trace;

use crate::{RelayClient, RelayError};

/// A stand-in for when no relay is available.
///
/// Every operation returns immediately with a neutral value: nothing
/// stored, nothing loaded, empty labels, no account states.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisconnectedRelayClient;

impl DisconnectedRelayClient {
    pub fn new() -> Self {
        Self
    }
}

impl RelayClient for DisconnectedRelayClient {
    async fn add_address_labels(&self, _labels: AddressLabels) -> Result<(), RelayError> {
        Ok(())
    }

    async fn clear_address_labels(&self) -> Result<(), RelayError> {
        Ok(())
    }

    async fn fetch_address_labels(&self) -> Result<AddressLabels, RelayError> {
        Ok(AddressLabels::new())
    }

    async fn fetch_account_states(
        &self,
        _address: &str,
    ) -> Result<Vec<RelayAccountState>, RelayError> {
        Ok(Vec::new())
    }

    async fn request_snapshot(&self, _label: Option<&str>) -> Result<String, RelayError> {
        Ok(String::new())
    }

    async fn request_load_snapshot(&self, _label: &str) -> Result<(), RelayError> {
        Ok(())
    }

    async fn request_save_account(&self, _address: &str) -> Result<String, RelayError> {
        Ok(String::new())
    }

    async fn request_store_keypair(
        &self,
        _id: &str,
        _keypair: &SigningKey,
    ) -> Result<(), RelayError> {
        Ok(())
    }

    async fn request_load_keypair(
        &self,
        _id: &str,
    ) -> Result<Option<SigningKey>, RelayError> {
        Ok(None)
    }

    async fn request_set_account(
        &self,
        _account: PersistedAccountInfo,
    ) -> Result<(), RelayError> {
        Ok(())
    }

    async fn request_restart_validator(&self) -> Result<(), RelayError> {
        Ok(())
    }

    async fn request_kill_amman(&self) -> Result<(), RelayError> {
        Ok(())
    }

    async fn disconnect(&self) {
        trace!("disconnected relay client has nothing to close");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_every_operation_is_neutral() {
        let client = DisconnectedRelayClient::new();
        let key = SigningKey::from_bytes(&[1; 32]);

        client.add_address_labels(AddressLabels::new()).await.unwrap();
        client.clear_address_labels().await.unwrap();
        assert!(client.fetch_address_labels().await.unwrap().is_empty());
        assert!(client.fetch_account_states("x").await.unwrap().is_empty());
        assert_eq!(client.request_snapshot(None).await.unwrap(), "");
        client.request_load_snapshot("s").await.unwrap();
        assert_eq!(client.request_save_account("x").await.unwrap(), "");
        client.request_store_keypair("payer", &key).await.unwrap();
        assert!(client.request_load_keypair("payer").await.unwrap().is_none());
        client.request_restart_validator().await.unwrap();
        client.request_kill_amman().await.unwrap();
        client.disconnect().await;
    }
}

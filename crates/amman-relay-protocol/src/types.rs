//! Payload types carried inside reply envelopes and request arguments.
//!
//! JSON field names are camelCase because the other end of the relay is
//! frequently a JavaScript test harness.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::ProtocolError;

/// Process id of the running validator.
pub type ValidatorPid = u32;

/// Known labels keyed by address.
pub type AddressLabels = BTreeMap<String, String>;

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

/// A 32-byte account address, base58 encoded on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; 32]);

impl Address {
    /// Wraps raw address bytes.
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Returns the raw address bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl FromStr for Address {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|_| ProtocolError::InvalidAddress(s.to_string()))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| ProtocolError::InvalidAddress(s.to_string()))?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.0).into_string())
    }
}

// ---------------------------------------------------------------------------
// Account states
// ---------------------------------------------------------------------------

/// One observed state of an account.
///
/// `account` is the decoded, human-readable account if a renderer knew
/// the account type; `rendered` is its pre-formatted text form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayAccountState {
    pub slot: u64,
    /// Milliseconds since the Unix epoch when the state was observed.
    pub timestamp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_diff: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rendered: Option<String>,
}

/// Reply to an account states request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountStatesResult {
    #[serde(alias = "pubkey")]
    pub address: String,
    pub states: Vec<RelayAccountState>,
}

/// Reply to an account save request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSaveResult {
    #[serde(alias = "pubkey")]
    pub address: String,
    pub account_path: String,
}

/// Reply to a snapshot save request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotSaveResult {
    pub snapshot_dir: String,
}

// ---------------------------------------------------------------------------
// Keypairs
// ---------------------------------------------------------------------------

/// Raw secret key bytes of a keypair.
///
/// Serializes as a JSON byte array. Also decodes from the object shape a
/// JavaScript `Uint8Array` takes when it is JSON stringified:
/// `{"0": 12, "1": 200, ...}`.
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SecretKeyBytes(Vec<u8>);

impl SecretKeyBytes {
    /// Wraps raw bytes.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Borrows the raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns the raw bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl From<Vec<u8>> for SecretKeyBytes {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

// Secrets stay out of logs.
impl fmt::Debug for SecretKeyBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretKeyBytes([{} bytes])", self.0.len())
    }
}

impl<'de> Deserialize<'de> for SecretKeyBytes {
    fn deserialize<D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Array(Vec<u8>),
            Indexed(BTreeMap<String, u8>),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Array(bytes) => Ok(Self(bytes)),
            Raw::Indexed(map) => {
                let mut indexed = map
                    .into_iter()
                    .map(|(k, v)| k.parse::<usize>().map(|i| (i, v)))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(serde::de::Error::custom)?;
                indexed.sort_unstable_by_key(|(i, _)| *i);
                if indexed.iter().enumerate().any(|(pos, (i, _))| pos != *i) {
                    return Err(serde::de::Error::custom(
                        "secret key indices are not contiguous",
                    ));
                }
                Ok(Self(indexed.into_iter().map(|(_, v)| v).collect()))
            }
        }
    }
}

/// Reply to a keypair load request. `secret_key_bytes` is absent when no
/// keypair is stored under `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadKeypairResult {
    pub id: String,
    #[serde(
        default,
        alias = "keypair",
        skip_serializing_if = "Option::is_none"
    )]
    pub secret_key_bytes: Option<SecretKeyBytes>,
}

// ---------------------------------------------------------------------------
// Labels
// ---------------------------------------------------------------------------

/// Reply carrying every known address label.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AddressLabelsResult {
    pub labels: AddressLabels,
}

// ---------------------------------------------------------------------------
// Persisted accounts
// ---------------------------------------------------------------------------

/// An account as written to disk by the persister, and as accepted by the
/// set-account request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedAccountInfo {
    pub pubkey: String,
    pub account: PersistedAccount,
}

/// On-chain account fields in their JSON-RPC form.
///
/// `data` is `[encoded, encoding]`, for example `["AAEC", "base64"]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedAccount {
    pub lamports: u64,
    pub data: (String, String),
    pub owner: String,
    pub executable: bool,
    #[serde(default)]
    pub rent_epoch: u64,
}

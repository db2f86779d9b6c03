//! The closed catalog of relay operations.
//!
//! Every request the relay understands is a [`RequestKind`]. Each one has
//! exactly one paired [`ResponseKind`]: the event the reply travels on.
//! For the two fire-and-forget label operations that paired kind is an
//! acknowledgement event rather than a regular response.
//!
//! [`Request`] is the typed form: the kind plus its positional arguments
//! decoded into Rust values. Both transports deliver arguments as an
//! ordered JSON list, so decoding lives here, once.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{
    AddressLabels, AddressLabelsResult, PersistedAccountInfo, ProtocolError,
    SecretKeyBytes,
};

// ---------------------------------------------------------------------------
// RequestKind
// ---------------------------------------------------------------------------

/// Name of a request, as it appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Version,
    ValidatorPid,
    KillAmman,
    RestartValidator,
    AccountStates,
    AccountSave,
    SetAccount,
    SnapshotSave,
    LoadSnapshot,
    StoreKeypair,
    LoadKeypair,
    UpdateAddressLabels,
    ClearAddressLabels,
    FetchAddressLabels,
}

impl RequestKind {
    /// Every request kind, in catalog order.
    pub const ALL: [RequestKind; 14] = [
        Self::Version,
        Self::ValidatorPid,
        Self::KillAmman,
        Self::RestartValidator,
        Self::AccountStates,
        Self::AccountSave,
        Self::SetAccount,
        Self::SnapshotSave,
        Self::LoadSnapshot,
        Self::StoreKeypair,
        Self::LoadKeypair,
        Self::UpdateAddressLabels,
        Self::ClearAddressLabels,
        Self::FetchAddressLabels,
    ];

    /// The event name used on both transports.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Version => "request:amman-version",
            Self::ValidatorPid => "request:validator-pid",
            Self::KillAmman => "request:kill-amman",
            Self::RestartValidator => "request:restart-validator",
            Self::AccountStates => "request:account-states",
            Self::AccountSave => "request:account-save",
            Self::SetAccount => "request:set-account",
            Self::SnapshotSave => "request:snapshot-save",
            Self::LoadSnapshot => "request:load-snapshot",
            Self::StoreKeypair => "request:store-keypair",
            Self::LoadKeypair => "request:load-keypair",
            Self::UpdateAddressLabels => "update:address-labels",
            Self::ClearAddressLabels => "clear:address-labels",
            Self::FetchAddressLabels => "get:known-address-labels",
        }
    }

    /// The kind the reply to this request travels on.
    pub const fn response(self) -> ResponseKind {
        match self {
            Self::Version => ResponseKind::Version,
            Self::ValidatorPid => ResponseKind::ValidatorPid,
            Self::KillAmman => ResponseKind::KillAmman,
            Self::RestartValidator => ResponseKind::RestartValidator,
            Self::AccountStates => ResponseKind::AccountStates,
            Self::AccountSave => ResponseKind::AccountSave,
            Self::SetAccount => ResponseKind::SetAccount,
            Self::SnapshotSave => ResponseKind::SnapshotSave,
            Self::LoadSnapshot => ResponseKind::LoadSnapshot,
            Self::StoreKeypair => ResponseKind::StoreKeypair,
            Self::LoadKeypair => ResponseKind::LoadKeypair,
            Self::UpdateAddressLabels => ResponseKind::AddressLabelsUpdated,
            Self::ClearAddressLabels => ResponseKind::AddressLabelsCleared,
            Self::FetchAddressLabels => ResponseKind::KnownAddressLabels,
        }
    }

    /// `true` for requests answered by an acknowledgement event instead
    /// of a regular reply.
    pub const fn is_fire_and_forget(self) -> bool {
        self.response().is_ack()
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestKind {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ProtocolError::UnknownEvent(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// ResponseKind
// ---------------------------------------------------------------------------

/// Name of a reply or acknowledgement event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseKind {
    Version,
    ValidatorPid,
    KillAmman,
    RestartValidator,
    AccountStates,
    AccountSave,
    SetAccount,
    SnapshotSave,
    LoadSnapshot,
    StoreKeypair,
    LoadKeypair,
    AddressLabelsUpdated,
    AddressLabelsCleared,
    KnownAddressLabels,
}

impl ResponseKind {
    /// Every response kind, in catalog order.
    pub const ALL: [ResponseKind; 14] = [
        Self::Version,
        Self::ValidatorPid,
        Self::KillAmman,
        Self::RestartValidator,
        Self::AccountStates,
        Self::AccountSave,
        Self::SetAccount,
        Self::SnapshotSave,
        Self::LoadSnapshot,
        Self::StoreKeypair,
        Self::LoadKeypair,
        Self::AddressLabelsUpdated,
        Self::AddressLabelsCleared,
        Self::KnownAddressLabels,
    ];

    /// The event name used on the persistent channel.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Version => "respond:amman-version",
            Self::ValidatorPid => "respond:validator-pid",
            Self::KillAmman => "respond:kill-amman",
            Self::RestartValidator => "respond:restart-validator",
            Self::AccountStates => "respond:account-states",
            Self::AccountSave => "respond:account-save",
            Self::SetAccount => "respond:set-account",
            Self::SnapshotSave => "respond:snapshot-save",
            Self::LoadSnapshot => "respond:load-snapshot",
            Self::StoreKeypair => "respond:store-keypair",
            Self::LoadKeypair => "respond:load-keypair",
            Self::AddressLabelsUpdated => "ack:update-address-labels",
            Self::AddressLabelsCleared => "ack:clear-address-labels",
            Self::KnownAddressLabels => "respond:known-address-labels",
        }
    }

    /// `true` for acknowledgement events of fire-and-forget requests.
    pub const fn is_ack(self) -> bool {
        matches!(self, Self::AddressLabelsUpdated | Self::AddressLabelsCleared)
    }
}

impl fmt::Display for ResponseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResponseKind {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ProtocolError::UnknownEvent(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// A request with its arguments decoded.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Version,
    ValidatorPid,
    KillAmman,
    RestartValidator,
    AccountStates {
        address: String,
    },
    /// `slot` selects a previously observed state of the account instead
    /// of its current on-chain data.
    AccountSave {
        address: String,
        slot: Option<u64>,
    },
    SetAccount {
        account: PersistedAccountInfo,
    },
    SnapshotSave {
        label: String,
    },
    LoadSnapshot {
        label: String,
    },
    StoreKeypair {
        id: String,
        secret_key: SecretKeyBytes,
    },
    LoadKeypair {
        id: String,
    },
    UpdateAddressLabels {
        labels: AddressLabels,
    },
    ClearAddressLabels,
    FetchAddressLabels,
}

impl Request {
    /// The kind of this request.
    pub fn kind(&self) -> RequestKind {
        match self {
            Self::Version => RequestKind::Version,
            Self::ValidatorPid => RequestKind::ValidatorPid,
            Self::KillAmman => RequestKind::KillAmman,
            Self::RestartValidator => RequestKind::RestartValidator,
            Self::AccountStates { .. } => RequestKind::AccountStates,
            Self::AccountSave { .. } => RequestKind::AccountSave,
            Self::SetAccount { .. } => RequestKind::SetAccount,
            Self::SnapshotSave { .. } => RequestKind::SnapshotSave,
            Self::LoadSnapshot { .. } => RequestKind::LoadSnapshot,
            Self::StoreKeypair { .. } => RequestKind::StoreKeypair,
            Self::LoadKeypair { .. } => RequestKind::LoadKeypair,
            Self::UpdateAddressLabels { .. } => {
                RequestKind::UpdateAddressLabels
            }
            Self::ClearAddressLabels => RequestKind::ClearAddressLabels,
            Self::FetchAddressLabels => RequestKind::FetchAddressLabels,
        }
    }

    /// Decodes the positional argument list that arrived with `kind`.
    ///
    /// Surplus arguments are ignored. A missing or `null` required
    /// argument is [`ProtocolError::MissingArgument`].
    pub fn from_args(
        kind: RequestKind,
        args: Vec<Value>,
    ) -> Result<Self, ProtocolError> {
        let mut args = Args {
            kind,
            values: args.into_iter(),
        };

        let request = match kind {
            RequestKind::Version => Self::Version,
            RequestKind::ValidatorPid => Self::ValidatorPid,
            RequestKind::KillAmman => Self::KillAmman,
            RequestKind::RestartValidator => Self::RestartValidator,
            RequestKind::AccountStates => Self::AccountStates {
                address: args.required("address")?,
            },
            RequestKind::AccountSave => Self::AccountSave {
                address: args.required("address")?,
                slot: args.optional("slot")?,
            },
            RequestKind::SetAccount => Self::SetAccount {
                account: args.required("account")?,
            },
            RequestKind::SnapshotSave => Self::SnapshotSave {
                label: args.required("label")?,
            },
            RequestKind::LoadSnapshot => Self::LoadSnapshot {
                label: args.required("label")?,
            },
            RequestKind::StoreKeypair => Self::StoreKeypair {
                id: args.required("id")?,
                secret_key: args.required("secretKey")?,
            },
            RequestKind::LoadKeypair => Self::LoadKeypair {
                id: args.required("id")?,
            },
            RequestKind::UpdateAddressLabels => {
                let labels: LabelsArg = args.required("labels")?;
                Self::UpdateAddressLabels {
                    labels: labels.into_labels(),
                }
            }
            RequestKind::ClearAddressLabels => Self::ClearAddressLabels,
            RequestKind::FetchAddressLabels => Self::FetchAddressLabels,
        };
        Ok(request)
    }

    /// Splits the request back into its kind and positional arguments.
    pub fn into_args(self) -> Result<(RequestKind, Vec<Value>), ProtocolError> {
        let kind = self.kind();
        let args = match self {
            Self::Version
            | Self::ValidatorPid
            | Self::KillAmman
            | Self::RestartValidator
            | Self::ClearAddressLabels
            | Self::FetchAddressLabels => vec![],
            Self::AccountStates { address } => vec![Value::String(address)],
            Self::AccountSave { address, slot } => {
                let mut args = vec![Value::String(address)];
                if let Some(slot) = slot {
                    args.push(Value::from(slot));
                }
                args
            }
            Self::SetAccount { account } => vec![to_value(&account)?],
            Self::SnapshotSave { label } | Self::LoadSnapshot { label } => {
                vec![Value::String(label)]
            }
            Self::StoreKeypair { id, secret_key } => {
                vec![Value::String(id), to_value(&secret_key)?]
            }
            Self::LoadKeypair { id } => vec![Value::String(id)],
            Self::UpdateAddressLabels { labels } => {
                vec![to_value(&AddressLabelsResult { labels })?]
            }
        };
        Ok((kind, args))
    }
}

fn to_value<T: serde::Serialize>(value: &T) -> Result<Value, ProtocolError> {
    serde_json::to_value(value).map_err(ProtocolError::Encode)
}

/// Cursor over a positional argument list.
struct Args {
    kind: RequestKind,
    values: std::vec::IntoIter<Value>,
}

impl Args {
    fn required<T: DeserializeOwned>(
        &mut self,
        name: &'static str,
    ) -> Result<T, ProtocolError> {
        self.optional(name)?.ok_or(ProtocolError::MissingArgument {
            request: self.kind,
            name,
        })
    }

    fn optional<T: DeserializeOwned>(
        &mut self,
        name: &'static str,
    ) -> Result<Option<T>, ProtocolError> {
        match self.values.next() {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value).map(Some).map_err(
                |source| ProtocolError::InvalidArgument {
                    request: self.kind,
                    name,
                    source,
                },
            ),
        }
    }
}

/// The label argument arrives in three shapes depending on the sender:
/// a `{labels}` object, that object wrapped in a reply envelope, or the
/// bare map.
#[derive(Deserialize)]
#[serde(untagged)]
enum LabelsArg {
    Wrapped(AddressLabelsResult),
    Reply { result: AddressLabelsResult },
    Plain(AddressLabels),
}

impl LabelsArg {
    fn into_labels(self) -> AddressLabels {
        match self {
            Self::Wrapped(r) | Self::Reply { result: r } => r.labels,
            Self::Plain(labels) => labels,
        }
    }
}

//! Routes of the stateless HTTP transport.
//!
//! Every request reachable over HTTP lives at `/relay/<request event>`.
//! Pure reads without arguments are `GET`; everything that takes
//! arguments or mutates state is `POST` with a JSON array body.
//! Fire-and-forget operations have no route: their acknowledgement only
//! exists on the persistent channel.

use std::fmt;

use crate::RequestKind;

/// First path segment of every HTTP relay route.
pub const RELAY_REST_PATH: &str = "relay";

/// HTTP verb a route requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayMethod {
    Get,
    Post,
}

impl RelayMethod {
    /// The verb as it appears in a request line.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

impl fmt::Display for RelayMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where and how a request is exposed over HTTP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub kind: RequestKind,
    pub method: RelayMethod,
}

impl Route {
    /// Absolute path of the route, e.g. `/relay/request:validator-pid`.
    pub fn path(&self) -> String {
        format!("/{RELAY_REST_PATH}/{}", self.kind.as_str())
    }
}

impl RequestKind {
    /// The HTTP route for this request, `None` for channel-only kinds.
    pub const fn route(self) -> Option<Route> {
        let method = match self {
            Self::Version | Self::ValidatorPid | Self::FetchAddressLabels => {
                RelayMethod::Get
            }
            Self::KillAmman
            | Self::RestartValidator
            | Self::AccountStates
            | Self::AccountSave
            | Self::SetAccount
            | Self::SnapshotSave
            | Self::LoadSnapshot
            | Self::StoreKeypair
            | Self::LoadKeypair => RelayMethod::Post,
            Self::UpdateAddressLabels | Self::ClearAddressLabels => {
                return None;
            }
        };
        Some(Route { kind: self, method })
    }
}

/// Returns the part of `path` after the relay prefix, or `None` if the
/// path is not under it.
///
/// `/relay` and `/relay/` yield `Some("")`; `/relayed/x` is not ours.
pub fn strip_relay_prefix(path: &str) -> Option<&str> {
    let rest = path.strip_prefix('/')?.strip_prefix(RELAY_REST_PATH)?;
    if rest.is_empty() {
        return Some(rest);
    }
    let rest = rest.strip_prefix('/')?;
    Some(rest.trim_end_matches('/'))
}

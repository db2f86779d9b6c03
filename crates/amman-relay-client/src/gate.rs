//! Interpreting the version handshake reply.

use amman_relay_protocol::{MIN_RELAY_VERSION_REQUIRED, RelayReply, Version};
use serde_json::Value;
use tracing::debug;

use crate::VersionGateError;

/// Decides whether the relay that sent `reply` is compatible.
///
/// Relays before the envelope format answered with a bare `[major, minor,
/// patch]` array; those are outdated by definition.
pub(crate) fn check_version_reply(
    reply: Value,
) -> Result<Version, VersionGateError> {
    if reply.is_array() {
        let detected = serde_json::from_value::<Version>(reply)
            .map(|v| v.to_string())
            .unwrap_or_else(|_| "unknown".into());
        return Err(VersionGateError::Outdated { detected });
    }

    match RelayReply::<Version>::from_value(reply) {
        Err(_) => Err(VersionGateError::Outdated {
            detected: "unknown".into(),
        }),
        Ok(RelayReply::Err(err)) => Err(VersionGateError::Incompatible { err }),
        Ok(RelayReply::Result(version))
            if !version.satisfies(&MIN_RELAY_VERSION_REQUIRED) =>
        {
            Err(VersionGateError::Outdated {
                detected: version.to_string(),
            })
        }
        Ok(RelayReply::Result(version)) => {
            debug!(
                "Verified that relay version {version} satisfies {MIN_RELAY_VERSION_REQUIRED}"
            );
            Ok(version)
        }
    }
}

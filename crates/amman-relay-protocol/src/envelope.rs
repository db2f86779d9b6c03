//! Reply envelopes.
//!
//! Every handler answer is a [`RelayReply`]: `{"result": T}` on success,
//! `{"err": "message"}` on failure. Being a Rust enum, it cannot carry
//! both or neither.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ProtocolError;

/// The `{result}` xor `{err}` reply shape.
///
/// Externally tagged with lowercase names, so serde produces exactly
/// `{"result": ...}` or `{"err": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayReply<T> {
    Result(T),
    Err(String),
}

impl<T> RelayReply<T> {
    /// Builds an error reply from anything printable.
    pub fn err(message: impl fmt::Display) -> Self {
        Self::Err(message.to_string())
    }

    /// Returns `true` for a `result` reply.
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Result(_))
    }

    /// Converts into a standard `Result`.
    pub fn into_result(self) -> Result<T, String> {
        match self {
            Self::Result(value) => Ok(value),
            Self::Err(err) => Err(err),
        }
    }

    /// Maps the success payload, leaving errors untouched.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> RelayReply<U> {
        match self {
            Self::Result(value) => RelayReply::Result(f(value)),
            Self::Err(err) => RelayReply::Err(err),
        }
    }
}

impl<T: DeserializeOwned> RelayReply<T> {
    /// Decodes a reply leniently.
    ///
    /// An object carrying a non-null `err` is an error reply; one carrying
    /// `result` is a success. Anything else is accepted only if `T` can
    /// be built from `null`, which covers void replies whose `result`
    /// was dropped by the sender (`{}`).
    pub fn from_value(value: Value) -> Result<Self, ProtocolError> {
        if let Value::Object(mut map) = value {
            match map.remove("err") {
                Some(Value::String(err)) => return Ok(Self::Err(err)),
                Some(Value::Null) | None => {}
                Some(other) => return Ok(Self::Err(other.to_string())),
            }
            let result = map.remove("result").unwrap_or(Value::Null);
            return serde_json::from_value(result)
                .map(Self::Result)
                .map_err(ProtocolError::Decode);
        }
        Err(ProtocolError::InvalidMessage(format!(
            "expected a reply envelope, got {value}"
        )))
    }
}

impl<T, E: fmt::Display> From<Result<T, E>> for RelayReply<T> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Self::Result(value),
            Err(e) => Self::err(e),
        }
    }
}

// ---------------------------------------------------------------------------
// VoidResult
// ---------------------------------------------------------------------------

/// The content-free success payload. Serializes as `null`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
pub struct VoidResult;

/// The one success reply for operations that return nothing.
pub const VOID_REPLY: RelayReply<VoidResult> = RelayReply::Result(VoidResult);

// ---------------------------------------------------------------------------
// AckReply
// ---------------------------------------------------------------------------

/// Payload of an acknowledgement event.
///
/// Acks keep the older boolean shape, `{"success": true}`, rather than a
/// void `result`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AckReply {
    Success { success: bool },
    Err { err: String },
}

impl AckReply {
    /// The ack for a successfully applied operation.
    pub fn success() -> Self {
        Self::Success { success: true }
    }

    /// Builds the ack matching an encoded reply envelope.
    pub fn from_envelope(envelope: &Value) -> Self {
        match envelope.get("err") {
            Some(Value::String(err)) => Self::Err { err: err.clone() },
            Some(Value::Null) | None => Self::success(),
            Some(other) => Self::Err {
                err: other.to_string(),
            },
        }
    }

    /// Converts into a standard `Result`. `{"success": false}` without a
    /// message is still a failure.
    pub fn into_result(self) -> Result<(), String> {
        match self {
            Self::Success { success: true } => Ok(()),
            Self::Success { success: false } => {
                Err("operation was not acknowledged as successful".into())
            }
            Self::Err { err } => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_result_reply_json_shape() {
        let reply: RelayReply<u32> = RelayReply::Result(42);
        assert_eq!(serde_json::to_value(&reply).unwrap(), json!({"result": 42}));
    }

    #[test]
    fn test_err_reply_json_shape() {
        let reply: RelayReply<u32> = RelayReply::err("boom");
        assert_eq!(serde_json::to_value(&reply).unwrap(), json!({"err": "boom"}));
    }

    #[test]
    fn test_void_reply_json_shape() {
        assert_eq!(
            serde_json::to_value(VOID_REPLY).unwrap(),
            json!({"result": null})
        );
    }

    #[test]
    fn test_strict_decode_rejects_both_fields() {
        let both = json!({"result": 1, "err": "x"});
        let result: Result<RelayReply<u32>, _> = serde_json::from_value(both);
        assert!(result.is_err());
    }

    #[test]
    fn test_from_value_prefers_err() {
        let reply = RelayReply::<u32>::from_value(json!({"err": "nope"}))
            .unwrap();
        assert_eq!(reply, RelayReply::Err("nope".into()));
    }

    #[test]
    fn test_from_value_accepts_empty_object_as_void() {
        let reply =
            RelayReply::<VoidResult>::from_value(json!({})).unwrap();
        assert_eq!(reply, VOID_REPLY);
    }

    #[test]
    fn test_from_value_empty_object_is_not_a_number() {
        assert!(RelayReply::<u32>::from_value(json!({})).is_err());
    }

    #[test]
    fn test_from_value_rejects_non_objects() {
        let result = RelayReply::<Vec<u32>>::from_value(json!([0, 12, 1]));
        assert!(matches!(result, Err(ProtocolError::InvalidMessage(_))));
    }

    #[test]
    fn test_from_result_stringifies_error() {
        let reply: RelayReply<()> =
            Err::<(), _>(std::io::Error::other("disk full")).into();
        assert_eq!(reply, RelayReply::Err("disk full".into()));
    }

    #[test]
    fn test_ack_shapes() {
        assert_eq!(
            serde_json::to_value(AckReply::success()).unwrap(),
            json!({"success": true})
        );
        assert_eq!(
            AckReply::from_envelope(&json!({"result": null})),
            AckReply::success()
        );
        assert_eq!(
            AckReply::from_envelope(&json!({"err": "bad"})),
            AckReply::Err { err: "bad".into() }
        );
    }

    #[test]
    fn test_ack_decodes_and_converts() {
        let ack: AckReply =
            serde_json::from_value(json!({"success": true})).unwrap();
        assert_eq!(ack.into_result(), Ok(()));

        let ack: AckReply =
            serde_json::from_value(json!({"err": "no"})).unwrap();
        assert_eq!(ack.into_result(), Err("no".to_string()));
    }
}

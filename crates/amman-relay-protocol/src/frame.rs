//! The persistent-channel wire frame.
//!
//! ```text
//! client → relay   {"event": "request:load-keypair",  "id": 7, "args": ["payer"]}
//! relay  → client  {"event": "respond:load-keypair",  "id": 7, "args": [{"result": {...}}]}
//! relay  → client  {"event": "ack:update-address-labels", "id": 8, "args": [{"success": true}]}
//! ```
//!
//! `id` is the caller's correlation id, echoed back unchanged so replies
//! to concurrent requests of the same kind cannot be confused. Peers that
//! omit it still work: the client then matches by event name alone.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{RequestKind, ResponseKind};

/// One message on the persistent channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(default)]
    pub args: Vec<Value>,
}

impl Frame {
    /// A request frame carrying positional arguments.
    pub fn request(kind: RequestKind, id: u64, args: Vec<Value>) -> Self {
        Self {
            event: kind.as_str().to_string(),
            id: Some(id),
            args,
        }
    }

    /// A reply or ack frame carrying a single payload.
    pub fn response(kind: ResponseKind, id: Option<u64>, payload: Value) -> Self {
        Self {
            event: kind.as_str().to_string(),
            id,
            args: vec![payload],
        }
    }

    /// Takes the first argument, `null` if there is none.
    pub fn into_payload(self) -> Value {
        self.args.into_iter().next().unwrap_or(Value::Null)
    }
}

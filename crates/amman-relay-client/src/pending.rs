//! Outstanding calls awaiting a reply.
//!
//! Each call registers the reply kind it expects under its correlation
//! id. The reader task hands incoming frames to [`PendingTable::resolve`],
//! which completes exactly one waiting call or drops the frame.

use std::collections::BTreeMap;

use amman_relay_protocol::{Frame, ResponseKind};
use serde_json::Value;
use tokio::sync::oneshot;

use crate::RelayError;

/// What a waiting call receives: the reply payload, or why none will come.
pub(crate) type Delivery = Result<Value, RelayError>;

struct Entry {
    expects: ResponseKind,
    tx: oneshot::Sender<Delivery>,
}

/// Calls awaiting a reply, keyed by correlation id.
///
/// Ids grow monotonically, so iteration order is registration order. That
/// is what the id-less fallback relies on to pick the oldest call.
#[derive(Default)]
pub(crate) struct PendingTable {
    entries: BTreeMap<u64, Entry>,
    closed: Option<String>,
}

impl PendingTable {
    /// Registers a call. Fails with [`RelayError::Closed`] once the
    /// connection is gone.
    pub(crate) fn register(
        &mut self,
        id: u64,
        expects: ResponseKind,
    ) -> Result<oneshot::Receiver<Delivery>, RelayError> {
        if self.closed.is_some() {
            return Err(RelayError::Closed);
        }
        let (tx, rx) = oneshot::channel();
        self.entries.insert(id, Entry { expects, tx });
        Ok(rx)
    }

    /// Forgets a call, typically after its deadline passed. Returns `false`
    /// if it was already resolved.
    pub(crate) fn cancel(&mut self, id: u64) -> bool {
        self.entries.remove(&id).is_some()
    }

    /// Completes the call `frame` answers. Returns the id of that call, or
    /// `None` if nothing was waiting for it.
    ///
    /// A frame with an id completes only the call registered under that id,
    /// and only if the event is the kind the call expects. A frame without
    /// one completes the oldest call expecting its kind.
    pub(crate) fn resolve(&mut self, frame: Frame) -> Option<u64> {
        let kind: ResponseKind = frame.event.parse().ok()?;
        let id = match frame.id {
            Some(id) => {
                let entry = self.entries.get(&id)?;
                (entry.expects == kind).then_some(id)?
            }
            None => self
                .entries
                .iter()
                .find(|(_, entry)| entry.expects == kind)
                .map(|(id, _)| *id)?,
        };
        let entry = self.entries.remove(&id)?;
        // The caller may have given up between its deadline and our lock.
        let _ = entry.tx.send(Ok(frame.into_payload()));
        Some(id)
    }

    /// Fails every waiting call and refuses new ones.
    pub(crate) fn fail_all(&mut self, reason: &str) {
        self.closed = Some(reason.to_string());
        for (_, entry) in std::mem::take(&mut self.entries) {
            let _ = entry.tx.send(Err(RelayError::Transport(reason.to_string())));
        }
    }

    /// Number of calls still waiting.
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

//! In-process connection pair.
//!
//! Two [`MemoryConnection`]s created by [`MemoryConnection::pair`] are
//! wired back to back: whatever one sends, the other receives. Closing
//! either end makes the peer's `recv` return `Ok(None)`.

use tokio::sync::{Mutex, mpsc};

use crate::{Connection, ConnectionId, TransportError};

/// One end of an in-memory connection.
pub struct MemoryConnection {
    id: ConnectionId,
    outbound: Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
    inbound: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
}

impl MemoryConnection {
    /// Creates two connected ends.
    pub fn pair() -> (Self, Self) {
        let (a_tx, a_rx) = mpsc::unbounded_channel();
        let (b_tx, b_rx) = mpsc::unbounded_channel();
        let a = Self {
            id: ConnectionId::next(),
            outbound: Mutex::new(Some(a_tx)),
            inbound: Mutex::new(b_rx),
        };
        let b = Self {
            id: ConnectionId::next(),
            outbound: Mutex::new(Some(b_tx)),
            inbound: Mutex::new(a_rx),
        };
        (a, b)
    }
}

impl Connection for MemoryConnection {
    type Error = TransportError;

    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        let outbound = self.outbound.lock().await;
        let Some(tx) = outbound.as_ref() else {
            return Err(TransportError::ConnectionClosed(
                "local end closed".into(),
            ));
        };
        tx.send(data.to_vec()).map_err(|_| {
            TransportError::ConnectionClosed("peer dropped".into())
        })
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        Ok(self.inbound.lock().await.recv().await)
    }

    async fn close(&self) -> Result<(), Self::Error> {
        // Dropping the sender ends the peer's stream.
        self.outbound.lock().await.take();
        Ok(())
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
